//! Textbook RSA: Miller-Rabin prime generation, key pair derivation and a
//! block-oriented file codec.
//!
//! This is raw RSA without OAEP or PKCS#1 padding. Identical plaintext blocks
//! encrypt to identical ciphertext blocks. Do not use it to protect real data.

pub mod cli;
pub mod config;
pub mod rsa;
pub mod util;

pub use rsa::{
    decrypt_file, encrypt_file, generate_keypair, BlockMode, CodecConfig, KeyGenerator, RsaError,
    RsaKey, RsaKeyPair, RsaResult,
};
