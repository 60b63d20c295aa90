// RSA Block Decryption
// Reverses the block encryption with the private key

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use log::{debug, trace, warn};
use num_traits::ToPrimitive;

use super::bigint::{from_bytes, to_bytes, to_fixed_bytes};
use super::codec::{read_batch, transform_batch, BlockLayout, BlockMode, CodecConfig, CodecStats};
use super::error::{RsaError, RsaResult};
use super::keygen::RsaKey;
use crate::util::file_ops::write_atomic;

/// Decrypt everything `reader` yields into `writer`.
///
/// Ciphertext is read in chunks of `cipher_len` bytes. Which key produced the
/// file is not recorded anywhere, so the wrong key yields garbage or a
/// `BlockOverflow` / `MalformedCiphertext` error rather than a clean rejection.
pub fn decrypt_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    private_key: &RsaKey,
    config: &CodecConfig,
) -> RsaResult<CodecStats> {
    let layout = BlockLayout::for_key(private_key, config.mode)?;
    debug!(
        "decrypting with {}-byte ciphertext / {}-byte plaintext blocks ({:?})",
        layout.cipher_len, layout.plain_len, config.mode
    );

    let stats = match config.mode {
        BlockMode::Padded => decrypt_padded(reader, writer, private_key, &layout, config)?,
        BlockMode::Legacy => {
            warn!("legacy block mode: block boundaries may be out of step with the encryptor");
            decrypt_legacy(reader, writer, private_key, &layout, config)?
        }
    };

    debug!(
        "decrypted {} bytes into {} bytes ({} blocks)",
        stats.bytes_in, stats.bytes_out, stats.blocks
    );
    Ok(stats)
}

fn decrypt_padded<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    key: &RsaKey,
    layout: &BlockLayout,
    config: &CodecConfig,
) -> RsaResult<CodecStats> {
    let mut stats = CodecStats::default();
    // The last two blocks (final data block and trailer) are held back until
    // the end of input is known
    let mut pending: Vec<Vec<u8>> = Vec::new();

    loop {
        let batch = read_batch(&mut reader, layout.cipher_len, config.batch_blocks)?;
        if batch.is_empty() {
            break;
        }
        if let Some(short) = batch.iter().find(|chunk| chunk.len() != layout.cipher_len) {
            return Err(RsaError::MalformedCiphertext(format!(
                "trailing {} bytes do not form a {}-byte block",
                short.len(),
                layout.cipher_len
            )));
        }
        stats.bytes_in += (batch.len() * layout.cipher_len) as u64;

        for m in transform_batch(&batch, key, config.parallel) {
            pending.push(to_fixed_bytes(&m, layout.plain_len)?);
        }

        if pending.len() > 2 {
            let ready = pending.len() - 2;
            for block in pending.drain(..ready) {
                writer.write_all(&block)?;
                stats.bytes_out += block.len() as u64;
                stats.blocks += 1;
            }
        }
        trace!("decrypted {} blocks so far", stats.blocks);
    }

    match pending.as_slice() {
        [] => {}
        [_] => {
            return Err(RsaError::MalformedCiphertext(
                "length trailer without any data block".to_string(),
            ))
        }
        [last, trailer] => {
            let tail_len = tail_length(trailer, layout.plain_len)?;
            let (padding, tail) = last.split_at(layout.plain_len - tail_len);
            if padding.iter().any(|&b| b != 0) {
                return Err(RsaError::MalformedCiphertext(format!(
                    "final block does not fit the recorded {} byte length",
                    tail_len
                )));
            }
            writer.write_all(tail)?;
            stats.bytes_out += tail.len() as u64;
            stats.blocks += 1;
        }
        _ => unreachable!("at most two blocks are held back"),
    }

    writer.flush()?;
    Ok(stats)
}

/// Decode the trailer block into the final chunk length, 1..=plain_len
fn tail_length(trailer: &[u8], plain_len: usize) -> RsaResult<usize> {
    from_bytes(trailer)
        .to_usize()
        .filter(|len| (1..=plain_len).contains(len))
        .ok_or_else(|| {
            RsaError::MalformedCiphertext("length trailer out of range (wrong key?)".to_string())
        })
}

/// Legacy format: every decrypted block is written with its
/// leading zero bytes stripped, and ciphertext chunks are taken at fixed
/// offsets even if the encryptor wrote them shorter.
fn decrypt_legacy<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    key: &RsaKey,
    layout: &BlockLayout,
    config: &CodecConfig,
) -> RsaResult<CodecStats> {
    let mut stats = CodecStats::default();

    loop {
        let batch = read_batch(&mut reader, layout.cipher_len, config.batch_blocks)?;
        if batch.is_empty() {
            break;
        }
        stats.bytes_in += batch.iter().map(|chunk| chunk.len() as u64).sum::<u64>();

        for m in transform_batch(&batch, key, config.parallel) {
            let block = to_bytes(&m);
            if block.len() > layout.plain_len {
                return Err(RsaError::BlockOverflow {
                    width: layout.plain_len,
                    needed: block.len(),
                });
            }
            writer.write_all(&block)?;
            stats.bytes_out += block.len() as u64;
            stats.blocks += 1;
        }
    }

    writer.flush()?;
    Ok(stats)
}

/// Decrypt a byte slice in memory
pub fn decrypt_bytes(ciphertext: &[u8], private_key: &RsaKey, config: &CodecConfig) -> RsaResult<Vec<u8>> {
    let mut out = Vec::new();
    decrypt_stream(ciphertext, &mut out, private_key, config)?;
    Ok(out)
}

/// Decrypt `input_path` into `output_path` with the default (padded) codec
pub fn decrypt_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    private_key: &RsaKey,
) -> RsaResult<CodecStats> {
    decrypt_file_with(input_path, output_path, private_key, &CodecConfig::default())
}

/// Decrypt a file; on error the destination is left untouched
pub fn decrypt_file_with<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    private_key: &RsaKey,
    config: &CodecConfig,
) -> RsaResult<CodecStats> {
    let reader = BufReader::new(File::open(input_path.as_ref())?);
    debug!(
        "decrypting {} -> {}",
        input_path.as_ref().display(),
        output_path.as_ref().display()
    );
    write_atomic(output_path.as_ref(), |writer| {
        decrypt_stream(reader, writer, private_key, config)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::bigint::from_u64;
    use crate::rsa::encrypt::encrypt_bytes;
    use crate::rsa::keygen::KeyGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // p = 61, q = 53, e = 17, d = 2753
    fn textbook_keys() -> (RsaKey, RsaKey) {
        let n = from_u64(3233);
        (
            RsaKey::new(from_u64(17), n.clone()).unwrap(),
            RsaKey::new(from_u64(2753), n).unwrap(),
        )
    }

    fn legacy() -> CodecConfig {
        CodecConfig::default().with_mode(BlockMode::Legacy)
    }

    #[test]
    fn test_roundtrip_padded() {
        let (public, private) = textbook_keys();
        let config = CodecConfig::default();
        let messages: Vec<Vec<u8>> = vec![
            b"A".to_vec(),
            b"Hello, RSA!".to_vec(),
            vec![0u8; 100],
            vec![255u8; 100],
            vec![0x00, 0x00, 0x41],
        ];

        for message in messages {
            let ciphertext = encrypt_bytes(&message, &public, &config).unwrap();
            assert_eq!(decrypt_bytes(&ciphertext, &private, &config).unwrap(), message);
        }
    }

    #[test]
    fn test_roundtrip_generated_key_short_tail() {
        let mut rng = StdRng::seed_from_u64(77);
        let keypair = KeyGenerator::new().generate_with_rng(&mut rng, 128).unwrap();
        let config = CodecConfig::default().with_batch_blocks(3);

        // 16-byte blocks; 0, 1, 15, 16, 17 and 100 bytes cover empty, short and exact tails
        for len in [0usize, 1, 15, 16, 17, 100] {
            let message: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
            let ciphertext = encrypt_bytes(&message, keypair.public_key(), &config).unwrap();
            let plaintext = decrypt_bytes(&ciphertext, keypair.private_key(), &config).unwrap();
            assert_eq!(plaintext, message, "length {}", len);
        }
    }

    #[test]
    fn test_legacy_strips_leading_zero_byte() {
        let mut rng = StdRng::seed_from_u64(16);
        let keypair = KeyGenerator::new().generate_with_rng(&mut rng, 16).unwrap();

        let padded = CodecConfig::default();
        let ciphertext = encrypt_bytes(&[0x00, 0x41], keypair.public_key(), &padded).unwrap();
        assert_eq!(
            decrypt_bytes(&ciphertext, keypair.private_key(), &padded).unwrap(),
            vec![0x00, 0x41]
        );

        let ciphertext = encrypt_bytes(&[0x00, 0x41], keypair.public_key(), &legacy()).unwrap();
        assert_eq!(
            decrypt_bytes(&ciphertext, keypair.private_key(), &legacy()).unwrap(),
            vec![0x41]
        );
    }

    #[test]
    fn test_legacy_desynchronizes() {
        let (public, private) = textbook_keys();
        // The first block encrypts to 0x01, one byte short of the 2-byte width
        let ciphertext = encrypt_bytes(&[0x01, 0x02], &public, &legacy()).unwrap();
        assert_eq!(ciphertext, vec![0x01, 0x06, 0xD8]);

        match decrypt_bytes(&ciphertext, &private, &legacy()) {
            Ok(plaintext) => assert_ne!(plaintext, vec![0x01, 0x02]),
            Err(e) => assert!(matches!(e, RsaError::BlockOverflow { .. })),
        }
    }

    #[test]
    fn test_empty_roundtrip() {
        let (_, private) = textbook_keys();
        for config in [CodecConfig::default(), legacy()] {
            assert!(decrypt_bytes(b"", &private, &config).unwrap().is_empty());
        }
    }

    #[test]
    fn test_rejects_truncated_ciphertext() {
        let (public, private) = textbook_keys();
        let config = CodecConfig::default();
        let mut ciphertext = encrypt_bytes(b"abc", &public, &config).unwrap();
        ciphertext.pop();

        let result = decrypt_bytes(&ciphertext, &private, &config);
        assert!(matches!(result, Err(RsaError::MalformedCiphertext(_))));
    }

    #[test]
    fn test_rejects_lone_trailer() {
        let (public, private) = textbook_keys();
        let config = CodecConfig::default();
        let ciphertext = encrypt_bytes(b"a", &public, &config).unwrap();

        // Keep only the trailer block
        let result = decrypt_bytes(&ciphertext[2..], &private, &config);
        assert!(matches!(result, Err(RsaError::MalformedCiphertext(_))));
    }

    #[test]
    fn test_rejects_bad_trailer() {
        let (public, private) = textbook_keys();
        let config = CodecConfig::default();
        let mut ciphertext = encrypt_bytes(b"ab", &public, &config).unwrap();

        // Replace the trailer with an encrypted length of 5 (> plain_len of 1)
        let bad = to_fixed_bytes(&public.apply(&from_u64(5)), 2).unwrap();
        let len = ciphertext.len();
        ciphertext[len - 2..].copy_from_slice(&bad);

        let result = decrypt_bytes(&ciphertext, &private, &config);
        assert!(matches!(result, Err(RsaError::MalformedCiphertext(_))));
    }
}
