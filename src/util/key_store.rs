// Key Persistence
// Stores keys as small JSON documents with hex-encoded integers

use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::file_ops::write_atomic;
use crate::rsa::bigint::RsaBigInt;
use crate::rsa::error::{RsaError, RsaResult};
use crate::rsa::keygen::{RsaKey, RsaKeyPair};

/// File name of the public key inside a key directory
pub const PUBLIC_KEY_FILE: &str = "public.key";

/// File name of the private key inside a key directory
pub const PRIVATE_KEY_FILE: &str = "private.key";

/// On-disk form of a key
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    exponent: String,
    modulus: String,
    bit_length: u32,
}

impl From<&RsaKey> for KeyFile {
    fn from(key: &RsaKey) -> Self {
        Self {
            exponent: hex::encode(key.exponent().to_bytes_be()),
            modulus: hex::encode(key.modulus().to_bytes_be()),
            bit_length: key.bit_length(),
        }
    }
}

impl TryFrom<KeyFile> for RsaKey {
    type Error = RsaError;

    fn try_from(file: KeyFile) -> RsaResult<Self> {
        let exponent = RsaBigInt::from_bytes_be(&hex::decode(&file.exponent)?);
        let modulus = RsaBigInt::from_bytes_be(&hex::decode(&file.modulus)?);
        let key = RsaKey::new(exponent, modulus).map_err(|e| RsaError::KeyFormat(e.to_string()))?;

        if key.bit_length() != file.bit_length {
            return Err(RsaError::KeyFormat(format!(
                "recorded bit length {} does not match exponent ({} bits)",
                file.bit_length,
                key.bit_length()
            )));
        }
        Ok(key)
    }
}

/// Serialize a key into `writer`
pub fn write_key<W: Write>(writer: W, key: &RsaKey) -> RsaResult<()> {
    serde_json::to_writer_pretty(writer, &KeyFile::from(key))?;
    Ok(())
}

/// Parse a key from its serialized bytes
pub fn read_key(bytes: &[u8]) -> RsaResult<RsaKey> {
    let file: KeyFile = serde_json::from_slice(bytes)?;
    RsaKey::try_from(file)
}

/// Save a key to `path`, replacing any existing file atomically
pub fn save_key(path: &Path, key: &RsaKey) -> RsaResult<()> {
    write_atomic(path, |w| write_key(w, key))?;
    debug!("saved key to {}", path.display());
    Ok(())
}

/// Load a key from `path`; a missing file is reported as `MissingKey`
pub fn load_key(path: &Path) -> RsaResult<RsaKey> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RsaError::MissingKey {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let key = read_key(&bytes)?;
    debug!("loaded {}-bit key from {}", key.modulus_bits(), path.display());
    Ok(key)
}

pub fn public_key_path(dir: &Path) -> PathBuf {
    dir.join(PUBLIC_KEY_FILE)
}

pub fn private_key_path(dir: &Path) -> PathBuf {
    dir.join(PRIVATE_KEY_FILE)
}

/// Write both halves of a key pair into `dir`
pub fn save_keypair(dir: &Path, keypair: &RsaKeyPair) -> RsaResult<()> {
    std::fs::create_dir_all(dir)?;
    save_key(&public_key_path(dir), keypair.public_key())?;
    save_key(&private_key_path(dir), keypair.private_key())?;
    Ok(())
}

pub fn load_public_key(dir: &Path) -> RsaResult<RsaKey> {
    load_key(&public_key_path(dir))
}

pub fn load_private_key(dir: &Path) -> RsaResult<RsaKey> {
    load_key(&private_key_path(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::bigint::from_u64;
    use crate::rsa::keygen::generate_keypair;

    #[test]
    fn test_keypair_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let keypair = generate_keypair(64).unwrap();

        save_keypair(dir.path(), &keypair).unwrap();

        assert_eq!(&load_public_key(dir.path()).unwrap(), keypair.public_key());
        assert_eq!(&load_private_key(dir.path()).unwrap(), keypair.private_key());
    }

    #[test]
    fn test_key_file_format() {
        let key = RsaKey::new(from_u64(17), from_u64(3233)).unwrap();
        let mut out = Vec::new();
        write_key(&mut out, &key).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["exponent"], "11");
        assert_eq!(value["modulus"], "0ca1");
        assert_eq!(value["bit_length"], 5);
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_public_key(dir.path());
        assert!(matches!(result, Err(RsaError::MissingKey { .. })));
    }

    #[test]
    fn test_malformed_key() {
        assert!(matches!(read_key(b"not json"), Err(RsaError::KeyFormat(_))));
        assert!(matches!(
            read_key(br#"{"exponent":"zz","modulus":"0ca1","bit_length":5}"#),
            Err(RsaError::KeyFormat(_))
        ));
        assert!(matches!(
            read_key(br#"{"exponent":"11","modulus":"0ca1","bit_length":9}"#),
            Err(RsaError::KeyFormat(_))
        ));
        // Modulus too small to hold a block
        assert!(matches!(
            read_key(br#"{"exponent":"03","modulus":"ff","bit_length":2}"#),
            Err(RsaError::KeyFormat(_))
        ));
    }
}
