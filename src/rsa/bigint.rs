// RSA Big Integer Operations
// Wrapper around num-bigint for RSA-specific operations

use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

use super::error::{RsaError, RsaResult};

/// RSA Big Integer type alias
pub type RsaBigInt = BigUint;

/// Create a big integer from u64
pub fn from_u64(n: u64) -> RsaBigInt {
    RsaBigInt::from(n)
}

/// Create a big integer from bytes (big-endian)
pub fn from_bytes(bytes: &[u8]) -> RsaBigInt {
    RsaBigInt::from_bytes_be(bytes)
}

/// Convert big integer to its minimal big-endian bytes.
/// Zero encodes to an empty vector, matching a fully stripped fixed-width encoding.
pub fn to_bytes(n: &RsaBigInt) -> Vec<u8> {
    if n.is_zero() {
        return Vec::new();
    }
    n.to_bytes_be()
}

/// Encode `n` big-endian into exactly `width` bytes, zero-padded on the left.
pub fn to_fixed_bytes(n: &RsaBigInt, width: usize) -> RsaResult<Vec<u8>> {
    let raw = to_bytes(n);
    if raw.len() > width {
        return Err(RsaError::BlockOverflow {
            width,
            needed: raw.len(),
        });
    }

    let mut out = vec![0u8; width];
    out[width - raw.len()..].copy_from_slice(&raw);
    Ok(out)
}

/// Number of significant bits; zero has bit length 0
pub fn bit_length(n: &RsaBigInt) -> u32 {
    n.bits() as u32
}

/// Modular exponentiation: base^exp mod modulus
/// Uses square-and-multiply, scanning the exponent from its least significant bit.
/// `modulus` must be non-zero.
pub fn mod_pow(base: &RsaBigInt, exp: &RsaBigInt, modulus: &RsaBigInt) -> RsaBigInt {
    if modulus.is_one() {
        return RsaBigInt::zero();
    }

    let mut result = RsaBigInt::one();
    let mut base = base % modulus;

    for i in 0..exp.bits() {
        if exp.bit(i) {
            result = (&result * &base) % modulus;
        }
        base = (&base * &base) % modulus;
    }

    result
}

/// Extended Euclidean Algorithm
/// Returns (gcd, x, y) such that a*x + b*y = gcd = gcd(a, b)
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let q = &old_r / &r;

        let next_r = &old_r - &q * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &q * &s;
        old_s = std::mem::replace(&mut s, next_s);

        let next_t = &old_t - &q * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    (old_r, old_s, old_t)
}

/// Compute modular inverse: a^(-1) mod m
/// Fails with `NoInverse` when gcd(a, m) != 1
pub fn mod_inverse(a: &RsaBigInt, m: &RsaBigInt) -> RsaResult<RsaBigInt> {
    if m.is_zero() {
        return Err(RsaError::NoInverse);
    }

    let a = BigInt::from_biguint(Sign::Plus, a.clone());
    let m = BigInt::from_biguint(Sign::Plus, m.clone());
    let (gcd, x, _) = extended_gcd(&a, &m);

    if !gcd.is_one() {
        return Err(RsaError::NoInverse);
    }

    // mod_floor keeps the result in [0, m) even when x is negative
    x.mod_floor(&m).to_biguint().ok_or(RsaError::NoInverse)
}

/// Greatest common divisor; gcd(a, 0) = a
pub fn gcd(a: &RsaBigInt, b: &RsaBigInt) -> RsaBigInt {
    a.gcd(b)
}

/// Uniform random integer in [0, 2^bits)
pub fn random_bits<R: Rng + ?Sized>(rng: &mut R, bits: u32) -> RsaBigInt {
    rng.gen_biguint(u64::from(bits))
}

/// Uniform random integer in [low, high)
pub fn random_range<R: Rng + ?Sized>(rng: &mut R, low: &RsaBigInt, high: &RsaBigInt) -> RsaBigInt {
    rng.gen_biguint_range(low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_mod_pow() {
        // 3^5 mod 7 = 243 mod 7 = 5
        let result = mod_pow(&from_u64(3), &from_u64(5), &from_u64(7));
        assert_eq!(result, from_u64(5));

        // 63^17 mod 91 = 7
        let result = mod_pow(&from_u64(63), &from_u64(17), &from_u64(91));
        assert_eq!(result, from_u64(7));
    }

    #[test]
    fn test_mod_pow_edge_cases() {
        assert_eq!(mod_pow(&from_u64(5), &from_u64(0), &from_u64(7)), from_u64(1));
        assert_eq!(mod_pow(&from_u64(0), &from_u64(3), &from_u64(7)), from_u64(0));
        assert_eq!(mod_pow(&from_u64(5), &from_u64(3), &from_u64(1)), from_u64(0));
    }

    #[test]
    fn test_mod_pow_matches_num_bigint() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let base = random_bits(&mut rng, 512);
            let exp = random_bits(&mut rng, 512);
            let modulus = random_bits(&mut rng, 512) | from_u64(1);
            assert_eq!(mod_pow(&base, &exp, &modulus), base.modpow(&exp, &modulus));
        }
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(&from_u64(12), &from_u64(15)), from_u64(3));
        assert_eq!(gcd(&from_u64(12), &from_u64(0)), from_u64(12));
        assert_eq!(gcd(&from_u64(0), &from_u64(15)), from_u64(15));
    }

    #[test]
    fn test_mod_inverse() {
        // 3 * 5 = 15 ≡ 1 mod 7, so inverse of 3 mod 7 is 5
        let a = from_u64(3);
        let m = from_u64(7);
        let inv = mod_inverse(&a, &m).unwrap();
        assert_eq!(inv, from_u64(5));
        assert_eq!((a * inv) % m, from_u64(1));

        // 17 * 2753 = 46801 = 15 * 3120 + 1
        assert_eq!(mod_inverse(&from_u64(17), &from_u64(3120)).unwrap(), from_u64(2753));
    }

    #[test]
    fn test_mod_inverse_none() {
        let result = mod_inverse(&from_u64(6), &from_u64(9));
        assert!(matches!(result, Err(RsaError::NoInverse)));
    }

    #[test]
    fn test_extended_gcd_bezout() {
        let a = BigInt::from(240);
        let b = BigInt::from(46);
        let (g, x, y) = extended_gcd(&a, &b);
        assert_eq!(g, BigInt::from(2));
        assert_eq!(&a * &x + &b * &y, g);
    }

    #[test]
    fn test_random_bits_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(bit_length(&random_bits(&mut rng, 13)) <= 13);
        }
        assert_eq!(bit_length(&from_u64(0)), 0);
        assert_eq!(bit_length(&from_u64(255)), 8);
        assert_eq!(bit_length(&from_u64(256)), 9);
    }

    #[test]
    fn test_fixed_bytes() {
        assert_eq!(to_fixed_bytes(&from_u64(0x41), 2).unwrap(), vec![0x00, 0x41]);
        assert_eq!(to_fixed_bytes(&from_u64(0), 3).unwrap(), vec![0, 0, 0]);
        assert!(matches!(
            to_fixed_bytes(&from_u64(0x1_0000), 2),
            Err(RsaError::BlockOverflow { width: 2, needed: 3 })
        ));
        assert!(to_bytes(&from_u64(0)).is_empty());
    }
}
