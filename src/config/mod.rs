//! Configuration management for imgpull
//!
//! Ambient settings (cache location, HTTP client, signature checking and
//! the external commands) are loaded in layers:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! Per-pull options come from the command line, not from here.
//!
//! # Usage
//!
//! ```no_run
//! use imgpull::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Cache root: {}", config.cache.root_dir().display());
//! ```
//!
//! # Environment Variables
//!
//! Settings can be overridden using environment variables with the pattern:
//! `IMGPULL__<section>__<key>`
//!
//! Examples:
//! - `IMGPULL__CACHE__ROOT=/scratch/imgpull`
//! - `IMGPULL__TRUST__ON_VERIFICATION_ERROR=fail`
//! - `IMGPULL__HTTP__REQUEST_TIMEOUT_SECS=600`
//!
//! # Signature Verification
//!
//! `trust.verify_command` is unset by default. Library images then cannot be
//! checked, so each library pull asks for confirmation on stdin and a kept
//! image is reported as a verification error. Set the command, or pass
//! `--allow-unauthenticated`, to avoid the prompt:
//!
//! ```toml
//! [trust]
//! verify_command = "sif-verify --strict"
//! ```
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from
//! `~/.config/imgpull/config.toml`. This can be overridden using the
//! `IMGPULL_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{CacheConfig, Config, HttpConfig, RegistryConfig, ShubConfig, TrustConfig};
pub use sources::default_path;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a
    /// setting fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
