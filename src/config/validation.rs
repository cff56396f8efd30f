use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} is set but empty")]
    EmptyCommand { field: &'static str },

    #[error("{field} must be positive")]
    ZeroTimeout { field: &'static str },

    #[error("http.user_agent must not be empty")]
    EmptyUserAgent,

    #[error("shub.host must not be empty")]
    EmptyShubHost,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_commands(config)?;
    validate_timeouts(config)?;
    validate_http(config)?;
    Ok(())
}

/// A configured command must name a program
fn validate_commands(config: &Config) -> Result<(), ValidationError> {
    let commands = [
        ("trust.verify_command", &config.trust.verify_command),
        ("registry.pull_command", &config.registry.pull_command),
    ];

    for (field, command) in commands {
        if command.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ValidationError::EmptyCommand { field });
        }
    }

    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    if config.http.connect_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "http.connect_timeout_secs",
        });
    }
    if config.http.request_timeout_secs == Some(0) {
        return Err(ValidationError::ZeroTimeout {
            field: "http.request_timeout_secs",
        });
    }
    if config.trust.prompt_timeout_secs == Some(0) {
        return Err(ValidationError::ZeroTimeout {
            field: "trust.prompt_timeout_secs",
        });
    }
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }
    if config.shub.host.trim().is_empty() {
        return Err(ValidationError::EmptyShubHost);
    }
    Ok(())
}
