use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::trust::VerificationErrorPolicy;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub shub: ShubConfig,
}

/// Library image cache
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Cache root. Defaults to `$XDG_CACHE_HOME/imgpull` or `~/.cache/imgpull`.
    pub root: Option<PathBuf>,
    /// Re-hash cached bytes before reusing them.
    #[serde(default = "default_verify_on_hit")]
    pub verify_on_hit: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            verify_on_hit: default_verify_on_hit(),
        }
    }
}

impl CacheConfig {
    pub fn root_dir(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }

        std::env::var_os("XDG_CACHE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| home::home_dir().map(|home| home.join(".cache")))
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR)
    }
}

pub(crate) const APP_DIR: &str = "imgpull";

fn default_verify_on_hit() -> bool {
    true
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-request limit. Unset means no limit, which suits large images.
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("imgpull/{}", env!("CARGO_PKG_VERSION"))
}

/// Signature gate
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TrustConfig {
    /// Verification command; the image path is appended.
    pub verify_command: Option<String>,
    #[serde(default)]
    pub on_verification_error: VerificationErrorPolicy,
    /// Unset waits for an answer forever.
    pub prompt_timeout_secs: Option<u64>,
}

impl TrustConfig {
    /// Whether library images can be checked at all. Without a command
    /// every library pull goes straight to the prompt.
    pub fn has_verifier(&self) -> bool {
        self.verify_command
            .as_deref()
            .is_some_and(|command| !command.trim().is_empty())
    }

    pub fn prompt_timeout(&self) -> Option<Duration> {
        self.prompt_timeout_secs.map(Duration::from_secs)
    }
}

/// Registry (OCI) references
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Builder command that turns a registry reference into an image file.
    pub pull_command: Option<String>,
}

/// Legacy hub
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShubConfig {
    #[serde(default = "default_shub_host")]
    pub host: String,
}

impl Default for ShubConfig {
    fn default() -> Self {
        Self {
            host: default_shub_host(),
        }
    }
}

fn default_shub_host() -> String {
    "singularity-hub.org".to_string()
}
