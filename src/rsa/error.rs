// RSA Error Types
// Single error enum shared by key generation, the block codec and key storage

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate
pub type RsaResult<T> = Result<T, RsaError>;

#[derive(Error, Debug)]
pub enum RsaError {
    /// Caller asked for something the algorithms cannot support (e.g. a 4-bit key)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// gcd(a, m) != 1, so a has no inverse modulo m
    #[error("no modular inverse exists")]
    NoInverse,

    #[error("key file not found: {}", path.display())]
    MissingKey { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("gave up after {attempts} random draws")]
    ExhaustedRetries { attempts: u64 },

    #[error("key generation cancelled")]
    Cancelled,

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// A decrypted value needs more bytes than the block allows
    #[error("block value needs {needed} bytes but the block width is {width}")]
    BlockOverflow { width: usize, needed: usize },

    #[error("invalid key file: {0}")]
    KeyFormat(String),
}

impl From<serde_json::Error> for RsaError {
    fn from(e: serde_json::Error) -> Self {
        RsaError::KeyFormat(e.to_string())
    }
}

impl From<hex::FromHexError> for RsaError {
    fn from(e: hex::FromHexError) -> Self {
        RsaError::KeyFormat(e.to_string())
    }
}
