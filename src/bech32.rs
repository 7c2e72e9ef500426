//! Bech32 codec for `npub`/`nsec` identifiers.
//!
//! Identifiers are a human-readable prefix, the separator `1`, a 32-byte
//! payload regrouped into 5-bit symbols, and a 6-symbol checksum, all drawn
//! from a fixed 32-character alphabet.

use crate::error::{Error, Result};

/// Data alphabet shared by all bech32 strings.
const CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Checksum generator polynomial, five 30-bit terms.
const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

/// Decode a bech32 string into its prefix and 32-byte payload.
///
/// Input is trimmed and lowercased first. Fails when the separator is
/// missing or ill-positioned, a data character falls outside the alphabet,
/// the checksum does not verify, or the payload does not regroup to exactly
/// 32 bytes with no residual padding bits.
pub fn decode(text: &str) -> Result<(String, [u8; 32])> {
    let bech = text.trim().to_lowercase();
    let pos = bech
        .rfind('1')
        .ok_or_else(|| Error::Format("missing bech32 separator".into()))?;
    if pos < 1 || pos + 7 > bech.len() {
        return Err(Error::Format("bech32 separator in invalid position".into()));
    }

    let hrp = &bech[..pos];
    let mut data = Vec::with_capacity(bech.len() - pos - 1);
    for c in bech[pos + 1..].bytes() {
        let idx = CHARSET
            .iter()
            .position(|&v| v == c)
            .ok_or_else(|| Error::Format(format!("invalid bech32 character {:?}", c as char)))?;
        data.push(idx as u8);
    }

    let mut values = hrp_expand(hrp);
    values.extend_from_slice(&data);
    if polymod(&values) != 1 {
        return Err(Error::Format("bech32 checksum mismatch".into()));
    }

    // Drop the 6 checksum symbols, then regroup strictly into bytes.
    let values = &data[..data.len() - 6];
    let bytes = convert_bits(values, 5, 8, false)?;
    let payload: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Format("bech32 payload is not 32 bytes".into()))?;

    Ok((hrp.to_string(), payload))
}

/// Encode a 32-byte payload under the given prefix. Exact inverse of
/// [`decode`].
pub fn encode(hrp: &str, payload: &[u8; 32]) -> String {
    let data = convert_bits(payload, 8, 5, true).expect("8-to-5 regrouping cannot fail");
    let checksum = create_checksum(hrp, &data);
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + 6);
    out.push_str(hrp);
    out.push('1');
    for v in data.iter().chain(checksum.iter()) {
        out.push(CHARSET[*v as usize] as char);
    }
    out
}

/// Expand the prefix into the checksum input stream: each character's high
/// 3 bits, a zero, then each character's low 5 bits.
fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut ret = Vec::with_capacity(hrp.len() * 2 + 1);
    for b in hrp.bytes() {
        ret.push(b >> 5);
    }
    ret.push(0);
    for b in hrp.bytes() {
        ret.push(b & 31);
    }
    ret
}

/// BIP-173 checksum polynomial over a 30-bit state.
fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let top = chk >> 25;
        chk = ((chk & 0x1ff_ffff) << 5) ^ v as u32;
        for (i, gen) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= gen;
            }
        }
    }
    chk
}

/// Compute the 6 checksum symbols for `hrp` + `data`.
fn create_checksum(hrp: &str, data: &[u8]) -> [u8; 6] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let pm = polymod(&values) ^ 1;
    let mut out = [0u8; 6];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ((pm >> (5 * (5 - i))) & 31) as u8;
    }
    out
}

/// Regroup a bit stream between group sizes. With `pad` false the
/// conversion is strict: leftover bits must be padding-free and fewer than
/// one input group.
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Result<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let maxv: u32 = (1 << to_bits) - 1;
    let mut ret = Vec::new();
    for &value in data {
        if (value as u32) >> from_bits != 0 {
            return Err(Error::Format("bech32 value out of range".into()));
        }
        acc = (acc << from_bits) | value as u32;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            ret.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            ret.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else {
        if bits >= from_bits {
            return Err(Error::Format("bech32 excess padding".into()));
        }
        if (acc << (to_bits - bits)) & maxv != 0 {
            return Err(Error::Format("bech32 non-zero padding bits".into()));
        }
    }
    Ok(ret)
}
