// RSA Module - Main module file
// Exports all RSA-related functionality

pub mod bigint;
pub mod codec;
pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod keygen;
pub mod primality;

pub use codec::{BlockLayout, BlockMode, CodecConfig, CodecStats};
pub use decrypt::{decrypt_bytes, decrypt_file, decrypt_file_with, decrypt_stream};
pub use encrypt::{encrypt_bytes, encrypt_file, encrypt_file_with, encrypt_stream};
pub use error::{RsaError, RsaResult};
pub use keygen::{generate_keypair, CancelToken, KeyGenerator, RsaKey, RsaKeyPair, MIN_KEY_BITS};
pub use primality::{is_probable_prime, is_probable_prime_with, DEFAULT_ROUNDS, SMALL_PRIMES};
