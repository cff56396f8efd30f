//! Registry references are handed to an external builder command.
//!
//! The command is invoked as
//! `<program> [args..] [--tmpdir DIR] [--force] [--nohttps] <destination> <reference>`
//! with registry credentials passed through the environment, never on the
//! command line.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ClientError, RegistryOptions, RegistryPuller, Result};

pub const USERNAME_ENV: &str = "IMGPULL_DOCKER_USERNAME";
pub const PASSWORD_ENV: &str = "IMGPULL_DOCKER_PASSWORD";
pub const LOGIN_ENV: &str = "IMGPULL_DOCKER_LOGIN";

#[derive(Debug, Clone, Default)]
pub struct CommandRegistryPuller {
    command: Vec<String>,
}

impl CommandRegistryPuller {
    /// `command` is split on whitespace. An empty command leaves registry
    /// pulls unsupported.
    pub fn new(command: Option<&str>) -> Self {
        Self {
            command: command
                .map(|c| c.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_default(),
        }
    }

    fn build(
        &self,
        destination: &Path,
        reference: &str,
        options: &RegistryOptions,
    ) -> Option<Command> {
        let (program, args) = self.command.split_first()?;

        let mut command = Command::new(program);
        command.args(args);

        if let Some(tmp_dir) = &options.tmp_dir {
            command.arg("--tmpdir").arg(tmp_dir);
        }
        if options.overwrite {
            command.arg("--force");
        }
        if options.no_https {
            command.arg("--nohttps");
        }
        command.arg(destination).arg(reference);

        if let Some(credentials) = &options.credentials {
            if let Some(username) = &credentials.username {
                command.env(USERNAME_ENV, username);
            }
            if let Some(password) = &credentials.password {
                command.env(PASSWORD_ENV, password);
            }
            if credentials.login {
                command.env(LOGIN_ENV, "1");
            }
        }

        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        Some(command)
    }
}

#[async_trait]
impl RegistryPuller for CommandRegistryPuller {
    async fn pull(
        &self,
        destination: &Path,
        reference: &str,
        options: &RegistryOptions,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let Some(mut command) = self.build(destination, reference, options) else {
            return Err(ClientError::Unsupported(format!(
                "no registry pull command configured for {reference}"
            )));
        };
        let program = self.command[0].clone();

        debug!(%program, reference, "Running registry pull command");

        let mut child = command.spawn().map_err(|e| ClientError::Command {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // kill_on_drop reaps the child once it goes out of scope.
                return Err(ClientError::Interrupted);
            }
            status = child.wait() => status.map_err(|e| ClientError::Command {
                program: program.clone(),
                reason: e.to_string(),
            })?,
        };

        if !status.success() {
            return Err(ClientError::Command {
                program,
                reason: format!("exited with {status}"),
            });
        }

        let size = tokio::fs::metadata(destination)
            .await
            .map_err(|source| ClientError::Io {
                path: destination.to_path_buf(),
                source,
            })?
            .len();

        info!(reference, destination = %destination.display(), bytes = size, "Registry pull complete");
        Ok(size)
    }
}
