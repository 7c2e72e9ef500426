//! BIP340 Schnorr signatures over secp256k1.
//!
//! Signatures are 64 bytes: the x-coordinate of the nonce point followed by
//! the response scalar, both big-endian. Public keys are x-only with the
//! even-y convention fixed at signing time.

use num_bigint::BigUint;
use num_traits::Zero;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::curve::{
    self, from_bytes, generator, group_order, lift_x, point_add, scalar_mul, to_bytes32,
};
use crate::error::{Error, Result};

const TAG_AUX: &str = "BIP0340/aux";
const TAG_NONCE: &str = "BIP0340/nonce";
const TAG_CHALLENGE: &str = "BIP0340/challenge";

/// Domain-separated hash: `SHA256(SHA256(tag) || SHA256(tag) || data)`.
///
/// The double inclusion of the tag hash is load-bearing for
/// interoperability; a single hash produces incompatible signatures.
fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(&tag_hash);
    hasher.update(&tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

/// Sign a 32-byte digest with a secret scalar, using fresh randomness as
/// the nonce auxiliary input.
pub fn sign(msg: &[u8; 32], seckey: &[u8; 32]) -> Result<[u8; 64]> {
    let mut aux = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut aux);
    sign_with_aux(msg, seckey, &aux)
}

/// Deterministic core of [`sign`]; crate-visible so known-answer vectors
/// can pin the auxiliary bytes.
pub(crate) fn sign_with_aux(msg: &[u8; 32], seckey: &[u8; 32], aux: &[u8; 32]) -> Result<[u8; 64]> {
    let n = group_order();
    let d0 = from_bytes(seckey);
    if d0.is_zero() || &d0 >= n {
        return Err(Error::Domain("secret scalar out of range".into()));
    }

    let pub_point = scalar_mul(&d0, generator())
        .ok_or_else(|| Error::Domain("secret scalar maps to infinity".into()))?;
    // x-only convention: the advertised key always has even y.
    let d = if pub_point.y.bit(0) { n - &d0 } else { d0 };
    let px = to_bytes32(&pub_point.x);

    let mut t = to_bytes32(&d);
    for (byte, mask) in t.iter_mut().zip(tagged_hash(TAG_AUX, aux)) {
        *byte ^= mask;
    }

    let mut nonce_input = Vec::with_capacity(96);
    nonce_input.extend_from_slice(&t);
    nonce_input.extend_from_slice(&px);
    nonce_input.extend_from_slice(msg);
    let k0 = from_bytes(&tagged_hash(TAG_NONCE, &nonce_input)) % n;
    if k0.is_zero() {
        return Err(Error::Signature("nonce reduced to zero".into()));
    }

    let r_point = scalar_mul(&k0, generator())
        .ok_or_else(|| Error::Signature("nonce maps to infinity".into()))?;
    let k = if r_point.y.bit(0) { n - &k0 } else { k0 };
    let rx = to_bytes32(&r_point.x);

    let e = challenge(&rx, &px, msg);
    let s = (k + e * d) % n;

    let mut sig = [0u8; 64];
    sig[..32].copy_from_slice(&rx);
    sig[32..].copy_from_slice(&to_bytes32(&s));
    Ok(sig)
}

/// Verify a 64-byte signature over a 32-byte digest under an x-only key.
///
/// Malformed inputs (r ≥ p, s ≥ n, key with no curve lift) are rejected,
/// never panicked on.
pub fn verify(sig: &[u8; 64], msg: &[u8; 32], pubkey_x: &[u8; 32]) -> bool {
    let p = curve::field_prime();
    let n = group_order();

    let r = from_bytes(&sig[..32]);
    let s = from_bytes(&sig[32..]);
    if &r >= p || &s >= n {
        return false;
    }

    let pub_point = match lift_x(&from_bytes(pubkey_x)) {
        Ok(pt) => pt,
        Err(_) => return false,
    };

    let mut rx = [0u8; 32];
    rx.copy_from_slice(&sig[..32]);
    let e = challenge(&rx, pubkey_x, msg);
    // R' = s*G - e*P, computed as s*G + (n - e)*P.
    let s_g = scalar_mul(&s, generator());
    let ne_p = scalar_mul(&((n - e) % n), &pub_point);
    let r_point = match point_add(s_g.as_ref(), ne_p.as_ref()) {
        Some(pt) => pt,
        None => return false,
    };

    !r_point.y.bit(0) && r_point.x == r
}

/// Derive the x-only public key for a secret scalar.
pub fn x_only_pubkey(seckey: &[u8; 32]) -> Result<[u8; 32]> {
    let n = group_order();
    let d = from_bytes(seckey);
    if d.is_zero() || &d >= n {
        return Err(Error::Domain("secret scalar out of range".into()));
    }
    let pt = scalar_mul(&d, generator())
        .ok_or_else(|| Error::Domain("secret scalar maps to infinity".into()))?;
    Ok(to_bytes32(&pt.x))
}

/// Challenge scalar `e` from the nonce x, key x, and message digest.
fn challenge(rx: &[u8; 32], px: &[u8; 32], msg: &[u8; 32]) -> BigUint {
    let mut input = Vec::with_capacity(96);
    input.extend_from_slice(rx);
    input.extend_from_slice(px);
    input.extend_from_slice(msg);
    from_bytes(&tagged_hash(TAG_CHALLENGE, &input)) % group_order()
}
