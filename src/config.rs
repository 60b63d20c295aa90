// src/config.rs
//! Runtime configuration loaded from an optional TOML file.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes. Command-line flags override whatever is loaded here.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::rsa::codec::{BlockMode, CodecConfig};
use crate::rsa::keygen::KeyGenerator;
use crate::rsa::primality::DEFAULT_ROUNDS;

/// Environment variable naming a config file when `--config` is not given
pub const CONFIG_ENV: &str = "RSA_BLOCKS_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub key_bits: u32,
    pub rounds: u32,
    pub mode: BlockMode,
    pub key_dir: PathBuf,
    pub parallel: bool,
    pub batch_blocks: usize,
    pub max_attempts: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_bits: 1024,
            rounds: DEFAULT_ROUNDS,
            mode: BlockMode::Padded,
            key_dir: PathBuf::from("."),
            parallel: true,
            batch_blocks: 256,
            max_attempts: None,
        }
    }
}

impl Config {
    /// Load from `explicit` if given (it must exist), else from `$RSA_BLOCKS_CONFIG`
    /// if set and present, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                warn!("{} points at missing {}, using defaults", CONFIG_ENV, path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig::default()
            .with_mode(self.mode)
            .with_parallel(self.parallel)
            .with_batch_blocks(self.batch_blocks)
    }

    pub fn key_generator(&self) -> KeyGenerator {
        let generator = KeyGenerator::new().with_rounds(self.rounds);
        match self.max_attempts {
            Some(max) => generator.with_max_attempts(max),
            None => generator,
        }
    }
}
