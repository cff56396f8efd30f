use super::models::{APP_DIR, Config};
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "IMGPULL_CONFIG";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "IMGPULL";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env is not an error
    let _ = dotenvy::dotenv();

    load_from_sources(default_path())
}

/// `$IMGPULL_CONFIG`, else `~/.config/imgpull/config.toml`.
pub fn default_path() -> PathBuf {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| home::home_dir().map(|home| home.join(".config")))
        .unwrap_or_default()
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::debug!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // IMGPULL__CACHE__VERIFY_ON_HIT -> cache.verify_on_hit
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::VerificationErrorPolicy;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert!(config.cache.verify_on_hit);
        assert_eq!(config.http.connect_timeout_secs, 30);
        assert_eq!(
            config.trust.on_verification_error,
            VerificationErrorPolicy::Degrade
        );
        assert_eq!(config.shub.host, "singularity-hub.org");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[cache]
root = "/var/cache/images"
verify_on_hit = false

[http]
connect_timeout_secs = 5
request_timeout_secs = 600

[trust]
verify_command = "sif-verify --strict"
on_verification_error = "fail"
prompt_timeout_secs = 60

[registry]
pull_command = "oci-build"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.cache.root_dir(), PathBuf::from("/var/cache/images"));
        assert!(!config.cache.verify_on_hit);
        assert_eq!(config.http.request_timeout_secs, Some(600));
        assert_eq!(config.trust.verify_command.as_deref(), Some("sif-verify --strict"));
        assert_eq!(config.trust.on_verification_error, VerificationErrorPolicy::Fail);
        assert_eq!(config.trust.prompt_timeout().map(|d| d.as_secs()), Some(60));
        assert_eq!(config.registry.pull_command.as_deref(), Some("oci-build"));
    }

    // Environment overrides are not exercised here: mutating the process
    // environment is unsafe under the parallel test runner.
}
