// Primality Testing
// Trial division by the first 100 primes, then Miller-Rabin

use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand::Rng;

use super::bigint::{from_u64, mod_pow, random_bits, random_range, RsaBigInt};

/// Default number of Miller-Rabin rounds. A composite survives one round with
/// probability at most 1/4, so the false-positive rate is bounded by 4^-rounds.
pub const DEFAULT_ROUNDS: u32 = 20;

/// The first 100 primes, used for fast rejection before Miller-Rabin.
pub static SMALL_PRIMES: [u32; 100] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, //
    31, 37, 41, 43, 47, 53, 59, 61, 67, 71, //
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, //
    127, 131, 137, 139, 149, 151, 157, 163, 167, 173, //
    179, 181, 191, 193, 197, 199, 211, 223, 227, 229, //
    233, 239, 241, 251, 257, 263, 269, 271, 277, 281, //
    283, 293, 307, 311, 313, 317, 331, 337, 347, 349, //
    353, 359, 367, 373, 379, 383, 389, 397, 401, 409, //
    419, 421, 431, 433, 439, 443, 449, 457, 461, 463, //
    467, 479, 487, 491, 499, 503, 509, 521, 523, 541,
];

/// Probable-prime check with the default round count and thread-local RNG.
pub fn is_probable_prime(n: &RsaBigInt) -> bool {
    is_probable_prime_with(n, DEFAULT_ROUNDS, &mut rand::thread_rng())
}

/// Probable-prime check with an explicit round count and RNG.
///
/// A small prime divisor decides the answer immediately: `n` is prime only if
/// it *is* that small prime. Otherwise Miller-Rabin runs `rounds` times.
pub fn is_probable_prime_with<R: Rng + ?Sized>(n: &RsaBigInt, rounds: u32, rng: &mut R) -> bool {
    if let Some(divisor) = small_prime_divisor(n) {
        return n.to_u32() == Some(divisor);
    }
    miller_rabin(n, rounds, rng)
}

/// Returns the first table prime dividing `n`, if any.
fn small_prime_divisor(n: &RsaBigInt) -> Option<u32> {
    SMALL_PRIMES
        .iter()
        .copied()
        .find(|&p| (n % p).is_zero())
}

/// Miller-Rabin primality test
/// Returns true if n is probably prime; stops at the first round that proves
/// n composite.
pub fn miller_rabin<R: Rng + ?Sized>(n: &RsaBigInt, rounds: u32, rng: &mut R) -> bool {
    let two = from_u64(2);
    let three = from_u64(3);

    if n == &two || n == &three {
        return true;
    }
    if n < &two || n.is_even() {
        return false;
    }

    // Write n-1 as d * 2^r with d odd
    let n_minus_one = n - 1u8;
    let r = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> r;

    'witness: for _ in 0..rounds {
        // Pick random witness a in [2, n-2]
        let a = random_range(rng, &two, &n_minus_one);
        let mut x = mod_pow(&a, &d, n);

        if x.is_one() || x == n_minus_one {
            continue;
        }

        for _ in 1..r {
            x = (&x * &x) % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }

        // Composite
        return false;
    }

    // Probably prime
    true
}

/// Draw a candidate of exactly `bits` bits with the top and bottom bit forced on.
pub fn prime_candidate<R: Rng + ?Sized>(rng: &mut R, bits: u32) -> RsaBigInt {
    let mut candidate = random_bits(rng, bits);
    candidate.set_bit(u64::from(bits) - 1, true);
    candidate.set_bit(0, true);
    candidate
}
