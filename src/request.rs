//! The immutable description of one pull.

use std::fmt;
use std::path::PathBuf;

use crate::cli::PullArgs;
use crate::error::Result;
use crate::reference::{self, ImageReference};

/// Docker-style registry login options.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Ask for credentials interactively.
    pub login: bool,
}

impl RegistryCredentials {
    /// `None` when no option was given at all.
    pub fn from_options(
        username: Option<String>,
        password: Option<String>,
        login: bool,
    ) -> Option<Self> {
        if username.is_none() && password.is_none() && !login {
            return None;
        }

        Some(Self {
            username,
            password,
            login,
        })
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("login", &self.login)
            .finish()
    }
}

#[derive(Clone)]
pub struct PullRequest {
    pub reference: ImageReference,
    pub destination: PathBuf,
    pub overwrite_allowed: bool,
    pub unauthenticated_allowed: bool,
    pub library_uri: String,
    pub library_token: Option<String>,
    pub tmp_dir: Option<PathBuf>,
    pub https_disabled: bool,
    pub registry_credentials: Option<RegistryCredentials>,
}

impl PullRequest {
    /// Build a request with every option at its default.
    pub fn new(reference: ImageReference, destination: impl Into<PathBuf>) -> Self {
        Self {
            reference,
            destination: destination.into(),
            overwrite_allowed: false,
            unauthenticated_allowed: false,
            library_uri: crate::cli::DEFAULT_LIBRARY.to_string(),
            library_token: None,
            tmp_dir: None,
            https_disabled: false,
            registry_credentials: None,
        }
    }

    pub fn from_args(args: &PullArgs) -> Result<Self> {
        let reference = ImageReference::parse(args.source())?;
        let name =
            reference::destination_name(&reference, args.name.as_deref(), args.positional_name());

        Ok(Self {
            destination: PathBuf::from(name),
            overwrite_allowed: args.force,
            unauthenticated_allowed: args.allow_unauthenticated,
            library_uri: args.library.clone(),
            library_token: args.token.clone().filter(|t| !t.is_empty()),
            tmp_dir: args.tmpdir.clone(),
            https_disabled: args.nohttps,
            registry_credentials: RegistryCredentials::from_options(
                args.docker_username.clone(),
                args.docker_password.clone(),
                args.docker_login,
            ),
            reference,
        })
    }
}

impl fmt::Debug for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullRequest")
            .field("reference", &self.reference)
            .field("destination", &self.destination)
            .field("overwrite_allowed", &self.overwrite_allowed)
            .field("unauthenticated_allowed", &self.unauthenticated_allowed)
            .field("library_uri", &self.library_uri)
            .field("library_token", &self.library_token.as_ref().map(|_| "<redacted>"))
            .field("tmp_dir", &self.tmp_dir)
            .field("https_disabled", &self.https_disabled)
            .field("registry_credentials", &self.registry_credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::error::PullError;
    use crate::reference::Transport;
    use clap::Parser;

    fn build(argv: &[&str]) -> Result<PullRequest> {
        let Commands::Pull(args) = Cli::try_parse_from(argv).unwrap().command;
        PullRequest::from_args(&args)
    }

    #[test]
    fn test_library_defaults() {
        let request = build(&["imgpull", "pull", "alpine"]).unwrap();
        assert_eq!(request.reference.transport(), &Transport::Library);
        assert_eq!(request.destination, PathBuf::from("alpine_latest"));
        assert!(request.registry_credentials.is_none());
        assert!(!request.overwrite_allowed);
    }

    #[test]
    fn test_name_priority() {
        let request = build(&["imgpull", "pull", "mine.img", "library://alpine"]).unwrap();
        assert_eq!(request.destination, PathBuf::from("mine.img"));

        let request = build(&[
            "imgpull",
            "pull",
            "--name",
            "override.img",
            "mine.img",
            "library://alpine",
        ])
        .unwrap();
        assert_eq!(request.destination, PathBuf::from("override.img"));
    }

    #[test]
    fn test_registry_credentials() {
        let request = build(&[
            "imgpull",
            "pull",
            "--docker-username",
            "bob",
            "--docker-password",
            "hunter2",
            "docker://ubuntu:20.04",
        ])
        .unwrap();

        let credentials = request.registry_credentials.clone().unwrap();
        assert_eq!(credentials.username.as_deref(), Some("bob"));
        assert_eq!(credentials.password.as_deref(), Some("hunter2"));
        assert!(!format!("{request:?}").contains("hunter2"));

        let login_only = RegistryCredentials::from_options(None, None, true).unwrap();
        assert!(login_only.login);
    }

    #[test]
    fn test_empty_locator_is_user_error() {
        let err = build(&["imgpull", "pull", "library://"]).unwrap_err();
        assert!(matches!(err, PullError::UserInput(_)));
    }
}
