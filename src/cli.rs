// Command Line Interface
// Argument definitions and command dispatch for the rsa-blocks binary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, LevelFilter};

use crate::config::Config;
use crate::rsa::codec::{BlockMode, CodecConfig};
use crate::rsa::decrypt::decrypt_file_with;
use crate::rsa::encrypt::encrypt_file_with;
use crate::rsa::error::RsaError;
use crate::util::file_ops::{decrypted_path, encrypted_path, format_file_size, get_file_size};
use crate::util::key_store::{load_private_key, load_public_key, save_keypair};

#[derive(Parser, Debug)]
#[command(name = "rsa-blocks", version, about = "Textbook RSA key generation and block file encryption")]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// TOML config file (defaults to $RSA_BLOCKS_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a key pair and write public.key / private.key
    Keygen {
        /// Requested key size; the modulus will be strictly longer
        #[arg(short, long)]
        bits: Option<u32>,

        /// Miller-Rabin rounds per prime candidate
        #[arg(long)]
        rounds: Option<u32>,

        #[arg(long)]
        key_dir: Option<PathBuf>,
    },
    /// Encrypt FILE with the public key (writes FILE.enc by default)
    Encrypt(CodecArgs),
    /// Decrypt FILE with the private key (strips .enc by default)
    Decrypt(CodecArgs),
}

#[derive(Args, Debug)]
pub struct CodecArgs {
    pub input: PathBuf,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Use the older zero-stripping block format (lossy)
    #[arg(long)]
    pub legacy: bool,

    /// Process blocks on a single thread
    #[arg(long)]
    pub sequential: bool,

    #[arg(long)]
    pub key_dir: Option<PathBuf>,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Run one parsed command line
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Keygen {
            bits,
            rounds,
            key_dir,
        } => {
            let bits = bits.unwrap_or(config.key_bits);
            let key_dir = key_dir.unwrap_or_else(|| config.key_dir.clone());
            let mut generator = config.key_generator();
            if let Some(rounds) = rounds {
                generator = generator.with_rounds(rounds);
            }

            info!("generating {}-bit key pair ({} rounds)", bits, generator.rounds());
            let keypair = generator.generate(bits).context("key generation failed")?;
            save_keypair(&key_dir, &keypair)
                .with_context(|| format!("failed to save keys to {}", key_dir.display()))?;
            info!(
                "wrote {}-bit key pair to {}",
                keypair.modulus_bits(),
                key_dir.display()
            );
        }
        Command::Encrypt(args) => {
            let key_dir = args.key_dir.clone().unwrap_or_else(|| config.key_dir.clone());
            let key = load_public_key(&key_dir).map_err(with_keygen_hint)?;
            let output = args.output.clone().unwrap_or_else(|| encrypted_path(&args.input));
            let codec = codec_config(&config, &args);

            let stats = encrypt_file_with(&args.input, &output, &key, &codec)
                .with_context(|| format!("failed to encrypt {}", args.input.display()))?;
            report("encrypted", &args.input, &output, stats.blocks);
        }
        Command::Decrypt(args) => {
            let key_dir = args.key_dir.clone().unwrap_or_else(|| config.key_dir.clone());
            let key = load_private_key(&key_dir).map_err(with_keygen_hint)?;
            let output = args.output.clone().unwrap_or_else(|| decrypted_path(&args.input));
            let codec = codec_config(&config, &args);

            let stats = decrypt_file_with(&args.input, &output, &key, &codec)
                .with_context(|| format!("failed to decrypt {}", args.input.display()))?;
            report("decrypted", &args.input, &output, stats.blocks);
        }
    }

    Ok(())
}

fn codec_config(config: &Config, args: &CodecArgs) -> CodecConfig {
    let mut codec = config.codec_config();
    if args.legacy {
        codec = codec.with_mode(BlockMode::Legacy);
    }
    if args.sequential {
        codec = codec.with_parallel(false);
    }
    codec
}

fn with_keygen_hint(err: RsaError) -> anyhow::Error {
    match err {
        RsaError::MissingKey { .. } => {
            anyhow::Error::new(err).context("no key found; run `rsa-blocks keygen` first")
        }
        other => anyhow::Error::new(other),
    }
}

fn report(action: &str, input: &Path, output: &Path, blocks: u64) {
    let size = |path: &Path| {
        get_file_size(path)
            .map(format_file_size)
            .unwrap_or_else(|_| "?".to_string())
    };
    info!(
        "{} {} ({}) -> {} ({}) in {} blocks",
        action,
        input.display(),
        size(input),
        output.display(),
        size(output),
        blocks
    );
}
