// RSA Block Encryption
// Splits a plaintext stream into fixed-size blocks and applies the public key

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use log::{debug, trace, warn};

use super::bigint::{from_u64, to_bytes, to_fixed_bytes, RsaBigInt};
use super::codec::{read_batch, transform_batch, BlockLayout, BlockMode, CodecConfig, CodecStats};
use super::error::RsaResult;
use super::keygen::RsaKey;
use crate::util::file_ops::write_atomic;

/// Encrypt everything `reader` yields into `writer`.
///
/// Plaintext is read in chunks of `plain_len` bytes; each chunk is read as a
/// big-endian integer, raised to the public exponent and written as one
/// ciphertext block. Blocks are independent of each other.
pub fn encrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    public_key: &RsaKey,
    config: &CodecConfig,
) -> RsaResult<CodecStats> {
    let layout = BlockLayout::for_key(public_key, config.mode)?;
    if config.mode == BlockMode::Legacy {
        warn!("legacy block mode strips leading zero bytes; output may not decrypt exactly");
    }
    debug!(
        "encrypting with {}-byte plaintext / {}-byte ciphertext blocks ({:?})",
        layout.plain_len, layout.cipher_len, config.mode
    );

    let mut stats = CodecStats::default();
    let mut last_chunk_len = 0usize;

    loop {
        let batch = read_batch(&mut reader, layout.plain_len, config.batch_blocks)?;
        let Some(last) = batch.last() else {
            break;
        };
        last_chunk_len = last.len();
        stats.bytes_in += batch.iter().map(|chunk| chunk.len() as u64).sum::<u64>();

        for c in transform_batch(&batch, public_key, config.parallel) {
            let block = encode_block(&c, &layout, config.mode)?;
            writer.write_all(&block)?;
            stats.bytes_out += block.len() as u64;
            stats.blocks += 1;
        }
        trace!("encrypted {} blocks so far", stats.blocks);
    }

    // Trailer: length of the final chunk, so decryption can drop its padding
    if config.mode == BlockMode::Padded && stats.blocks > 0 {
        let trailer = public_key.apply(&from_u64(last_chunk_len as u64));
        let block = to_fixed_bytes(&trailer, layout.cipher_len)?;
        writer.write_all(&block)?;
        stats.bytes_out += block.len() as u64;
    }

    writer.flush()?;
    debug!(
        "encrypted {} bytes into {} bytes ({} blocks)",
        stats.bytes_in, stats.bytes_out, stats.blocks
    );
    Ok(stats)
}

fn encode_block(c: &RsaBigInt, layout: &BlockLayout, mode: BlockMode) -> RsaResult<Vec<u8>> {
    match mode {
        BlockMode::Padded => to_fixed_bytes(c, layout.cipher_len),
        BlockMode::Legacy => Ok(to_bytes(c)),
    }
}

/// Encrypt a byte slice in memory
pub fn encrypt_bytes(plaintext: &[u8], public_key: &RsaKey, config: &CodecConfig) -> RsaResult<Vec<u8>> {
    let mut out = Vec::new();
    encrypt_stream(plaintext, &mut out, public_key, config)?;
    Ok(out)
}

/// Encrypt `input_path` into `output_path` with the default (padded) codec
pub fn encrypt_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    public_key: &RsaKey,
) -> RsaResult<CodecStats> {
    encrypt_file_with(input_path, output_path, public_key, &CodecConfig::default())
}

/// Encrypt a file; the output only appears once it has been fully written
pub fn encrypt_file_with<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    public_key: &RsaKey,
    config: &CodecConfig,
) -> RsaResult<CodecStats> {
    let reader = BufReader::new(File::open(input_path.as_ref())?);
    debug!(
        "encrypting {} -> {}",
        input_path.as_ref().display(),
        output_path.as_ref().display()
    );
    write_atomic(output_path.as_ref(), |writer| {
        encrypt_stream(reader, writer, public_key, config)
    })
}
