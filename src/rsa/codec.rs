// Block Codec Shared Pieces
// Block layout, codec configuration and chunked I/O used by encrypt and decrypt

use std::io::{self, Read};

use rayon::prelude::*;
use serde::Deserialize;

use super::bigint::RsaBigInt;
use super::error::{RsaError, RsaResult};
use super::keygen::RsaKey;

/// How blocks are laid out on disk.
///
/// `Legacy` strips leading zero bytes from every block before writing, the
/// older on-disk format. Any block whose value is short of the
/// declared width shifts every later block boundary, so files written this
/// way do not always decrypt back to their input. Use it only to produce or
/// read files in that older format.
///
/// `Padded` zero-pads every block to its declared width and appends a
/// trailer block recording the length of the final chunk, so decryption is
/// byte-exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockMode {
    #[default]
    Padded,
    Legacy,
}

/// Plaintext and ciphertext block widths in bytes for one modulus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub plain_len: usize,
    pub cipher_len: usize,
}

impl BlockLayout {
    /// Legacy keeps floor(bits/8). Padded uses floor((bits-1)/8), which is
    /// the same except when bits is a multiple of 8, and always keeps every
    /// plaintext block strictly below the modulus.
    pub fn new(modulus_bits: u32, mode: BlockMode) -> RsaResult<Self> {
        let plain_bits = match mode {
            BlockMode::Legacy => modulus_bits,
            BlockMode::Padded => modulus_bits.saturating_sub(1),
        };
        let plain_len = (plain_bits / 8) as usize;

        if plain_len == 0 {
            return Err(RsaError::InvalidInput(format!(
                "a {}-bit modulus is too small to hold a one-byte block",
                modulus_bits
            )));
        }

        Ok(Self {
            plain_len,
            cipher_len: plain_len + 1,
        })
    }

    pub fn for_key(key: &RsaKey, mode: BlockMode) -> RsaResult<Self> {
        Self::new(key.modulus_bits(), mode)
    }
}

/// Codec settings
#[derive(Clone, Debug)]
pub struct CodecConfig {
    pub mode: BlockMode,
    pub parallel: bool,
    pub batch_blocks: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            mode: BlockMode::Padded,
            parallel: true,
            batch_blocks: 256,
        }
    }
}

impl CodecConfig {
    pub fn with_mode(mut self, mode: BlockMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_batch_blocks(mut self, blocks: usize) -> Self {
        self.batch_blocks = blocks.max(1);
        self
    }
}

/// Counters reported by a finished encrypt or decrypt run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodecStats {
    pub blocks: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Fill `buf` from `reader`, stopping early only at end of input.
/// Returns the number of bytes read.
pub(crate) fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read up to `max_blocks` chunks of `width` bytes. Only the last chunk of the
/// input may be shorter than `width`.
pub(crate) fn read_batch<R: Read>(
    reader: &mut R,
    width: usize,
    max_blocks: usize,
) -> io::Result<Vec<Vec<u8>>> {
    let max_blocks = max_blocks.max(1);
    let mut batch = Vec::with_capacity(max_blocks);
    while batch.len() < max_blocks {
        let mut buf = vec![0u8; width];
        let n = read_chunk(reader, &mut buf)?;
        if n == 0 {
            break;
        }
        buf.truncate(n);
        let short = n < width;
        batch.push(buf);
        if short {
            break;
        }
    }
    Ok(batch)
}

/// Apply the key to every chunk of a batch, keeping input order
pub(crate) fn transform_batch(
    chunks: &[Vec<u8>],
    key: &RsaKey,
    parallel: bool,
) -> Vec<RsaBigInt> {
    let apply = |chunk: &Vec<u8>| key.apply(&RsaBigInt::from_bytes_be(chunk));
    if parallel && chunks.len() > 1 {
        chunks.par_iter().map(apply).collect()
    } else {
        chunks.iter().map(apply).collect()
    }
}
