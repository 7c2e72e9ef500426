//! Key material and identifier conversions.
//!
//! Secret keys travel as `nsec` bech32 text and live in memory as a
//! [`SecretKey`] that wipes itself on drop. Public keys are x-only
//! 32-byte coordinates, shown as lowercase hex or `npub` text.

use std::fmt;

use zeroize::Zeroize;

use crate::bech32;
use crate::error::{Error, Result};
use crate::schnorr;

/// Bech32 prefix for public key identifiers.
pub const NPUB_HRP: &str = "npub";
/// Bech32 prefix for secret key identifiers.
pub const NSEC_HRP: &str = "nsec";

/// A 32-byte secret signing scalar. Zeroed on drop and never printed.
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Decode an `nsec` identifier into a secret key.
    pub fn from_nsec(nsec: &str) -> Result<Self> {
        let (hrp, payload) = bech32::decode(nsec)?;
        if hrp != NSEC_HRP {
            return Err(Error::Format(format!("expected nsec, got {hrp}")));
        }
        Ok(Self(payload))
    }

    /// Parse a 64-char hex secret key.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| Error::Format(format!("invalid hex secret key: {e}")))?;
        let payload: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Format("secret key is not 32 bytes".into()))?;
        Ok(Self(payload))
    }

    /// Raw scalar bytes, big-endian.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the x-only public key for this secret.
    pub fn x_only_public_key(&self) -> Result<[u8; 32]> {
        schnorr::x_only_pubkey(&self.0)
    }

    /// Encode this secret as an `nsec` identifier.
    pub fn to_nsec(&self) -> String {
        bech32::encode(NSEC_HRP, &self.0)
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Convert an `npub` identifier to 64-char lowercase hex.
pub fn npub_to_hex(npub: &str) -> Result<String> {
    let (hrp, payload) = bech32::decode(npub)?;
    if hrp != NPUB_HRP {
        return Err(Error::Format(format!("expected npub, got {hrp}")));
    }
    Ok(hex::encode(payload))
}

/// Encode a 64-char hex public key as an `npub` identifier.
pub fn hex_to_npub(hex_key: &str) -> Result<String> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| Error::Format(format!("invalid hex public key: {e}")))?;
    let payload: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Format("public key is not 32 bytes".into()))?;
    Ok(bech32::encode(NPUB_HRP, &payload))
}

/// Normalize a public key to 64-char lowercase hex.
///
/// Accepts either raw 64-hex (as handed out by NIP-07 signers) or an
/// `npub` identifier.
pub fn normalize_pubkey(pubkey: &str) -> Result<String> {
    let trimmed = pubkey.trim();
    if trimmed.len() == 64 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(trimmed.to_lowercase());
    }
    if trimmed.to_lowercase().starts_with("npub1") {
        return npub_to_hex(trimmed);
    }
    Err(Error::Format("public key is neither hex nor npub".into()))
}

/// Discovery-lookup boundary: map an `npub` identifier to hex, or `None`.
///
/// The caller owns routing and response formatting for the name→hex
/// mapping; this only answers whether the identifier resolves. The shape
/// is checked before decoding so arbitrary text fails fast.
pub fn identifier_to_hex(identifier: &str) -> Option<String> {
    let id = identifier.trim();
    if !is_npub_shaped(id) {
        return None;
    }
    npub_to_hex(id).ok()
}

/// Cheap shape check: `npub1` followed by exactly 58 alphanumeric chars.
fn is_npub_shaped(id: &str) -> bool {
    let lower = id.to_lowercase();
    lower.len() == 63
        && lower.starts_with("npub1")
        && lower[5..]
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}
