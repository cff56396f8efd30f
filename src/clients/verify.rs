//! Signature check through an external command.
//!
//! The configured command is run with the image path appended. Exit status
//! zero means a valid signature; any other exit status means the image is
//! not signed. Failing to run the command at all is a verification error.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{ClientError, Result, SignatureStatus, SignatureVerifier};

#[derive(Debug, Clone, Default)]
pub struct CommandVerifier {
    command: Vec<String>,
}

impl CommandVerifier {
    pub fn new(command: Option<&str>) -> Self {
        Self {
            command: command
                .map(|c| c.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SignatureVerifier for CommandVerifier {
    async fn verify(&self, image: &Path) -> Result<SignatureStatus> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(ClientError::Unsupported(
                "no signature verification command configured".to_string(),
            ));
        };

        let output = Command::new(program)
            .args(args)
            .arg(image)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ClientError::Command {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            %program,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Signature check finished"
        );

        match output.status.code() {
            Some(0) => Ok(SignatureStatus::Signed),
            Some(_) => Ok(SignatureStatus::NotSigned),
            None => Err(ClientError::Command {
                program: program.clone(),
                reason: format!("terminated by signal ({})", output.status),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_command_is_an_error() {
        let err = CommandVerifier::new(None)
            .verify(Path::new("img"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unsupported(_)));

        let err = CommandVerifier::new(Some("/nonexistent/verifier"))
            .verify(Path::new("img"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Command { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_maps_to_signature_status() {
        let signed = CommandVerifier::new(Some("true"))
            .verify(Path::new("img"))
            .await
            .unwrap();
        assert_eq!(signed, SignatureStatus::Signed);

        let unsigned = CommandVerifier::new(Some("false"))
            .verify(Path::new("img"))
            .await
            .unwrap();
        assert_eq!(unsigned, SignatureStatus::NotSigned);
    }
}
