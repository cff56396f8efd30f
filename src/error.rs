//! Pull failure taxonomy and its mapping onto process exit codes

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cache::CacheError;
use crate::clients::ClientError;
use crate::config::ConfigError;
use crate::handlers::RegistryError;
use crate::reference::ReferenceError;

/// Exit status for every fatal pull failure without a dedicated code.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status when the operator declines an unsigned image.
pub const EXIT_DECLINED: u8 = 3;
/// Exit status when a declined image could not be removed.
pub const EXIT_CLEANUP_FAILED: u8 = 255;
/// Exit status used by the interrupt guard.
pub const EXIT_INTERRUPTED: u8 = 1;

#[derive(Debug, Error)]
pub enum PullError {
    #[error("{0}")]
    UserInput(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("cached file hash ({actual}) and expected hash ({expected}) do not match")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("unsigned image declined by operator")]
    TrustDeclined,

    #[error("unable to verify image: {0}")]
    Verification(String),

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pull interrupted by termination request")]
    Interrupted,

    #[error("unable to delete image {}: {source}", path.display())]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, PullError>;

impl PullError {
    pub fn fs(path: impl AsRef<Path>, source: io::Error) -> Self {
        PullError::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            PullError::TrustDeclined => EXIT_DECLINED,
            PullError::CleanupFailed { .. } => EXIT_CLEANUP_FAILED,
            PullError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<ReferenceError> for PullError {
    fn from(value: ReferenceError) -> Self {
        PullError::UserInput(value.to_string())
    }
}

impl From<RegistryError> for PullError {
    fn from(value: RegistryError) -> Self {
        PullError::UserInput(value.to_string())
    }
}

impl From<CacheError> for PullError {
    fn from(value: CacheError) -> Self {
        match value {
            CacheError::Io { path, source } => PullError::Filesystem { path, source },
        }
    }
}

impl From<ClientError> for PullError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Interrupted => PullError::Interrupted,
            ClientError::Io { path, source } => PullError::Filesystem { path, source },
            ClientError::Unsupported(message) => PullError::UserInput(message),
            ClientError::AlreadyExists(path) => PullError::UserInput(format!(
                "image file {} already exists - will not overwrite",
                path.display()
            )),
            other => PullError::Network(other.to_string()),
        }
    }
}
