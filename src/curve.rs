//! Finite-field and group arithmetic over secp256k1.
//!
//! Field elements are big-endian unsigned integers kept fully reduced into
//! `[0, p)`. The point at infinity is represented as `None`; a `Point` value
//! always carries affine coordinates satisfying `y^2 = x^3 + 7 mod p`.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::error::{Error, Result};

const P_HEX: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F";
const N_HEX: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141";
const GX_HEX: &str = "79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";
const GY_HEX: &str = "483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8";

/// Affine curve point. Infinity is `Option::<Point>::None`, never a
/// coordinate pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub x: BigUint,
    pub y: BigUint,
}

fn from_hex(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).expect("constant parses")
}

/// The secp256k1 field prime `p`.
pub fn field_prime() -> &'static BigUint {
    static P: OnceLock<BigUint> = OnceLock::new();
    P.get_or_init(|| from_hex(P_HEX))
}

/// The secp256k1 group order `n`.
pub fn group_order() -> &'static BigUint {
    static N: OnceLock<BigUint> = OnceLock::new();
    N.get_or_init(|| from_hex(N_HEX))
}

/// The secp256k1 generator point `G`.
pub fn generator() -> &'static Point {
    static G: OnceLock<Point> = OnceLock::new();
    G.get_or_init(|| Point {
        x: from_hex(GX_HEX),
        y: from_hex(GY_HEX),
    })
}

/// `(a + b) mod m`.
pub fn add_mod(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    (a + b) % m
}

/// `(a - b) mod m`, never producing a negative intermediate.
pub fn sub_mod(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    (a % m + m - b % m) % m
}

/// `(a * b) mod m`.
pub fn mul_mod(a: &BigUint, b: &BigUint, m: &BigUint) -> BigUint {
    (a * b) % m
}

/// Modular inverse via Fermat's little theorem. Fails on inputs congruent
/// to zero rather than returning a bogus value.
pub fn mod_inv(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    if (a % m).is_zero() {
        return Err(Error::Domain("no inverse for zero".into()));
    }
    let two = BigUint::from(2u8);
    Ok(a.modpow(&(m - two), m))
}

/// Modular square root in the secp256k1 field. `p ≡ 3 mod 4`, so the root
/// is `a^((p+1)/4)`; returns `None` when `a` is a non-residue.
pub fn mod_sqrt(a: &BigUint) -> Option<BigUint> {
    let p = field_prime();
    let exp = (p + BigUint::one()) >> 2;
    let y = a.modpow(&exp, p);
    if mul_mod(&y, &y, p) != a % p {
        return None;
    }
    Some(y)
}

fn is_odd(v: &BigUint) -> bool {
    v.bit(0)
}

/// Double a point. Returns infinity when `y == 0`.
pub fn point_double(pt: &Point) -> Option<Point> {
    let p = field_prime();
    if pt.y.is_zero() {
        return None;
    }
    let three = BigUint::from(3u8);
    let two = BigUint::from(2u8);
    let num = mul_mod(&three, &mul_mod(&pt.x, &pt.x, p), p);
    let den = mul_mod(&two, &pt.y, p);
    let lambda = mul_mod(&num, &mod_inv(&den, p).ok()?, p);
    let x3 = sub_mod(
        &mul_mod(&lambda, &lambda, p),
        &mul_mod(&two, &pt.x, p),
        p,
    );
    let y3 = sub_mod(&mul_mod(&lambda, &sub_mod(&pt.x, &x3, p), p), &pt.y, p);
    Some(Point { x: x3, y: y3 })
}

/// Add two points, treating `None` as the identity. `P + (-P)` yields
/// infinity; `P + P` delegates to doubling.
pub fn point_add(a: Option<&Point>, b: Option<&Point>) -> Option<Point> {
    let p = field_prime();
    let pt1 = match a {
        Some(pt) => pt,
        None => return b.cloned(),
    };
    let pt2 = match b {
        Some(pt) => pt,
        None => return Some(pt1.clone()),
    };

    if pt1.x == pt2.x {
        if add_mod(&pt1.y, &pt2.y, p).is_zero() {
            return None;
        }
        return point_double(pt1);
    }

    let num = sub_mod(&pt2.y, &pt1.y, p);
    let den = sub_mod(&pt2.x, &pt1.x, p);
    let lambda = mul_mod(&num, &mod_inv(&den, p).ok()?, p);
    let x3 = sub_mod(&sub_mod(&mul_mod(&lambda, &lambda, p), &pt1.x, p), &pt2.x, p);
    let y3 = sub_mod(&mul_mod(&lambda, &sub_mod(&pt1.x, &x3, p), p), &pt1.y, p);
    Some(Point { x: x3, y: y3 })
}

/// Negate a point in place of subtraction: `-P = (x, p - y)`.
pub fn point_negate(pt: &Point) -> Point {
    let p = field_prime();
    Point {
        x: pt.x.clone(),
        y: sub_mod(&BigUint::zero(), &pt.y, p),
    }
}

/// Scalar multiplication by binary double-and-add. `k` is reduced modulo
/// the group order first; `k ≡ 0` yields infinity.
pub fn scalar_mul(k: &BigUint, pt: &Point) -> Option<Point> {
    let k = k % group_order();
    if k.is_zero() {
        return None;
    }
    let mut result: Option<Point> = None;
    let mut addend: Option<Point> = Some(pt.clone());
    for i in 0..k.bits() {
        if k.bit(i) {
            result = point_add(result.as_ref(), addend.as_ref());
        }
        addend = match addend {
            Some(ref a) => point_double(a),
            // Doubling reached infinity; remaining bits contribute nothing.
            None => break,
        };
    }
    result
}

/// Recover the unique even-y point for an x-coordinate.
///
/// Computes `y^2 = x^3 + 7`, takes the modular square root, and rejects
/// x-coordinates with no lift. The returned y is negated if odd.
pub fn lift_x(x: &BigUint) -> Result<Point> {
    let p = field_prime();
    if x >= p {
        return Err(Error::Domain("x-coordinate exceeds field prime".into()));
    }
    let seven = BigUint::from(7u8);
    let y2 = add_mod(&x.modpow(&BigUint::from(3u8), p), &seven, p);
    let y = mod_sqrt(&y2)
        .ok_or_else(|| Error::Domain("x-coordinate has no curve point".into()))?;
    let y = if is_odd(&y) { sub_mod(&BigUint::zero(), &y, p) } else { y };
    Ok(Point { x: x.clone(), y })
}

/// Whether an affine pair satisfies the curve equation.
pub fn on_curve(x: &BigUint, y: &BigUint) -> bool {
    let p = field_prime();
    let seven = BigUint::from(7u8);
    mul_mod(y, y, p) == add_mod(&x.modpow(&BigUint::from(3u8), p), &seven, p)
}

/// Big-endian 32-byte encoding, left-padded with zeros.
pub fn to_bytes32(v: &BigUint) -> [u8; 32] {
    let raw = v.to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - raw.len()..].copy_from_slice(&raw);
    out
}

/// Parse a big-endian byte string into an integer.
pub fn from_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}
