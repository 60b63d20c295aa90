// File Operations for RSA Encryption/Decryption
// Atomic output files, default output names and size formatting

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::rsa::error::RsaResult;

/// Suffix appended to encrypted files
pub const ENCRYPTED_SUFFIX: &str = "enc";

/// Suffix used for decrypted output when the input has no `.enc` suffix
pub const DECRYPTED_SUFFIX: &str = "dec";

/// Write `path` through a temporary file in the same directory and rename it
/// into place only if `write` succeeds. On error the temporary file is
/// removed and any existing file at `path` is untouched.
pub fn write_atomic<T, F>(path: &Path, write: F) -> RsaResult<T>
where
    F: FnOnce(&mut dyn Write) -> RsaResult<T>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    let value = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let value = write(&mut out)?;
        out.flush()?;
        value
    };
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(value)
}

/// `notes.txt` -> `notes.txt.enc`
pub fn encrypted_path(input: &Path) -> PathBuf {
    append_suffix(input, ENCRYPTED_SUFFIX)
}

/// `notes.txt.enc` -> `notes.txt`; anything else gets `.dec` appended
pub fn decrypted_path(input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) if ext == ENCRYPTED_SUFFIX => input.with_extension(""),
        _ => append_suffix(input, DECRYPTED_SUFFIX),
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Get file size in bytes
pub fn get_file_size(path: &Path) -> RsaResult<u64> {
    let metadata = std::fs::metadata(path)?;
    Ok(metadata.len())
}

/// Format file size for display
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::error::RsaError;

    #[test]
    fn test_output_paths() {
        assert_eq!(encrypted_path(Path::new("a/notes.txt")), PathBuf::from("a/notes.txt.enc"));
        assert_eq!(decrypted_path(Path::new("a/notes.txt.enc")), PathBuf::from("a/notes.txt"));
        assert_eq!(decrypted_path(Path::new("notes.bin")), PathBuf::from("notes.bin.dec"));
        assert_eq!(decrypted_path(Path::new("archive")), PathBuf::from("archive.dec"));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_write_atomic_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let written = write_atomic(&path, |w| {
            w.write_all(b"hello")?;
            Ok(5)
        })
        .unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_write_atomic_failure_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"original").unwrap();

        let result: RsaResult<()> = write_atomic(&path, |w| {
            w.write_all(b"partial")?;
            Err(RsaError::MalformedCiphertext("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"original");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
