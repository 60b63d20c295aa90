// RSA Key Generation
// Implements RSA key pair generation (public and private keys)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use num_traits::One;
use rand::Rng;

use super::bigint::{bit_length, gcd, mod_inverse, mod_pow, random_bits, RsaBigInt};
use super::error::{RsaError, RsaResult};
use super::primality::{is_probable_prime_with, prime_candidate, DEFAULT_ROUNDS};

/// Smallest key size that still leaves room for the asymmetric p/q split
pub const MIN_KEY_BITS: u32 = 8;

/// One half of a key pair: an exponent together with the shared modulus.
///
/// `bit_length` is the bit length of the exponent, cached at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKey {
    exponent: RsaBigInt,
    modulus: RsaBigInt,
    bit_length: u32,
}

impl RsaKey {
    /// Build a key, rejecting moduli that cannot carry a single byte block
    pub fn new(exponent: RsaBigInt, modulus: RsaBigInt) -> RsaResult<Self> {
        if bit_length(&modulus) <= MIN_KEY_BITS {
            return Err(RsaError::InvalidInput(format!(
                "modulus must exceed {} bits, got {}",
                MIN_KEY_BITS,
                bit_length(&modulus)
            )));
        }
        Ok(Self::from_trusted(exponent, modulus))
    }

    fn from_trusted(exponent: RsaBigInt, modulus: RsaBigInt) -> Self {
        let bit_length = bit_length(&exponent);
        Self {
            exponent,
            modulus,
            bit_length,
        }
    }

    pub fn exponent(&self) -> &RsaBigInt {
        &self.exponent
    }

    pub fn modulus(&self) -> &RsaBigInt {
        &self.modulus
    }

    /// Bit length of the exponent
    pub fn bit_length(&self) -> u32 {
        self.bit_length
    }

    /// Bit length of the modulus; this is what sizes codec blocks
    pub fn modulus_bits(&self) -> u32 {
        bit_length(&self.modulus)
    }

    /// Raw textbook RSA on one block: block^exponent mod modulus
    pub fn apply(&self, block: &RsaBigInt) -> RsaBigInt {
        mod_pow(block, &self.exponent, &self.modulus)
    }
}

/// RSA Key Pair (both public and private keys)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyPair {
    public_key: RsaKey,
    private_key: RsaKey,
}

impl RsaKeyPair {
    pub fn public_key(&self) -> &RsaKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &RsaKey {
        &self.private_key
    }

    /// Bit length of the shared modulus
    pub fn modulus_bits(&self) -> u32 {
        self.public_key.modulus_bits()
    }

    pub fn into_parts(self) -> (RsaKey, RsaKey) {
        (self.public_key, self.private_key)
    }
}

/// Cooperative cancellation flag for the key generation retry loops
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counts random draws across one generation run
struct Attempts<'a> {
    count: u64,
    max: Option<u64>,
    cancel: Option<&'a CancelToken>,
}

impl Attempts<'_> {
    fn tick(&mut self) -> RsaResult<()> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(RsaError::Cancelled);
        }
        self.count += 1;
        match self.max {
            Some(max) if self.count > max => Err(RsaError::ExhaustedRetries { attempts: max }),
            _ => Ok(()),
        }
    }
}

/// Key generator with a configurable Miller-Rabin round count, optional
/// draw limit and optional cancellation.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    rounds: u32,
    max_attempts: Option<u64>,
    cancel: Option<CancelToken>,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            max_attempts: None,
            cancel: None,
        }
    }
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Miller-Rabin rounds per candidate; error probability is at most 4^-rounds
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Cap on the total number of prime and exponent draws
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Generate a key pair using the thread-local RNG
    pub fn generate(&self, target_bits: u32) -> RsaResult<RsaKeyPair> {
        self.generate_with_rng(&mut rand::thread_rng(), target_bits)
    }

    /// Generate a key pair whose modulus has strictly more than `target_bits` bits
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        target_bits: u32,
    ) -> RsaResult<RsaKeyPair> {
        if target_bits < MIN_KEY_BITS {
            return Err(RsaError::InvalidInput(format!(
                "key size must be at least {} bits, got {}",
                MIN_KEY_BITS, target_bits
            )));
        }

        let mut attempts = Attempts {
            count: 0,
            max: self.max_attempts,
            cancel: self.cancel.as_ref(),
        };

        loop {
            let (p, q) = self.sample_primes(rng, target_bits, &mut attempts)?;
            match derive_keypair(rng, &p, &q, target_bits, &mut attempts) {
                Ok(keypair) => {
                    debug!(
                        "generated {}-bit modulus after {} draws (e: {} bits, d: {} bits)",
                        keypair.modulus_bits(),
                        attempts.count,
                        keypair.public_key.bit_length(),
                        keypair.private_key.bit_length()
                    );
                    return Ok(keypair);
                }
                Err(RsaError::NoInverse) => debug!("exponent had no inverse, regenerating primes"),
                Err(e) => return Err(e),
            }
        }
    }

    /// Draw p with ceil(bits/2)+1 bits and q with floor(bits/2) bits until
    /// their product is longer than `target_bits`.
    fn sample_primes<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        target_bits: u32,
        attempts: &mut Attempts<'_>,
    ) -> RsaResult<(RsaBigInt, RsaBigInt)> {
        let p_bits = target_bits.div_ceil(2) + 1;
        let q_bits = target_bits / 2;

        loop {
            let p = self.random_prime(rng, p_bits, attempts)?;
            let q = self.random_prime(rng, q_bits, attempts)?;
            let n_bits = bit_length(&(&p * &q));
            if n_bits > target_bits {
                return Ok((p, q));
            }
            trace!("modulus only {} bits, resampling pair", n_bits);
        }
    }

    fn random_prime<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bits: u32,
        attempts: &mut Attempts<'_>,
    ) -> RsaResult<RsaBigInt> {
        loop {
            attempts.tick()?;
            let candidate = prime_candidate(rng, bits);
            if is_probable_prime_with(&candidate, self.rounds, rng) {
                trace!("accepted {}-bit prime after {} draws", bits, attempts.count);
                return Ok(candidate);
            }
        }
    }
}

/// Derive (e, n) and (d, n) from two primes. The public exponent is drawn
/// uniformly from `target_bits` bits until it is coprime to the totient.
fn derive_keypair<R: Rng + ?Sized>(
    rng: &mut R,
    p: &RsaBigInt,
    q: &RsaBigInt,
    target_bits: u32,
    attempts: &mut Attempts<'_>,
) -> RsaResult<RsaKeyPair> {
    let n = p * q;
    let phi_n = (p - 1u8) * (q - 1u8);

    let e = loop {
        attempts.tick()?;
        let e = random_bits(rng, target_bits);
        // e = 1 would make encryption the identity map
        if e > RsaBigInt::one() && gcd(&e, &phi_n).is_one() {
            break e;
        }
    };

    let d = mod_inverse(&e, &phi_n)?;

    Ok(RsaKeyPair {
        public_key: RsaKey::from_trusted(e, n.clone()),
        private_key: RsaKey::from_trusted(d, n),
    })
}

/// Generate a key pair with default settings
pub fn generate_keypair(target_bits: u32) -> RsaResult<RsaKeyPair> {
    KeyGenerator::new().generate(target_bits)
}
