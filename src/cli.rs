use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_LIBRARY: &str = "https://library.sylabs.io";

#[derive(Parser, Debug)]
#[command(name = "imgpull", version)]
#[command(about = "Pull container images from a library, hub, URL or registry", long_about = None)]
pub struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull an image to a local file
    Pull(PullArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct PullArgs {
    /// Optional destination name followed by the image source
    #[arg(value_name = "[NAME] SOURCE", required = true, num_args = 1..=2)]
    pub args: Vec<String>,

    /// Library endpoint for library:// and untagged references
    #[arg(long, env = "IMGPULL_LIBRARY", default_value = DEFAULT_LIBRARY)]
    pub library: String,

    /// Overwrite an existing destination
    #[arg(short = 'F', long, env = "IMGPULL_FORCE")]
    pub force: bool,

    /// Do not check the image signature
    #[arg(short = 'U', long, env = "IMGPULL_ALLOW_UNAUTHENTICATED")]
    pub allow_unauthenticated: bool,

    /// Destination name, taking precedence over a positional name
    #[arg(long, env = "IMGPULL_NAME", hide = true)]
    pub name: Option<String>,

    /// Scratch directory for registry builds
    #[arg(long, env = "IMGPULL_TMPDIR", hide = true)]
    pub tmpdir: Option<PathBuf>,

    /// Use plain HTTP for hub and registry transfers
    #[arg(long, env = "IMGPULL_NOHTTPS")]
    pub nohttps: bool,

    /// Registry username
    #[arg(long, env = "IMGPULL_DOCKER_USERNAME")]
    pub docker_username: Option<String>,

    /// Registry password
    #[arg(long, env = "IMGPULL_DOCKER_PASSWORD", hide_env_values = true)]
    pub docker_password: Option<String>,

    /// Log in to the registry interactively
    #[arg(long, env = "IMGPULL_DOCKER_LOGIN")]
    pub docker_login: bool,

    /// Library access token
    #[arg(long, env = "IMGPULL_TOKEN", hide = true, hide_env_values = true)]
    pub token: Option<String>,
}

impl PullArgs {
    /// The image source, always the last positional argument.
    pub fn source(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or_default()
    }

    /// The destination name given in front of the source, if any.
    pub fn positional_name(&self) -> Option<&str> {
        match self.args.as_slice() {
            [name, _source] => Some(name.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_args(argv: &[&str]) -> PullArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Pull(args) => args,
        }
    }

    #[test]
    fn test_single_source() {
        let args = pull_args(&["imgpull", "pull", "library://alpine"]);
        assert_eq!(args.source(), "library://alpine");
        assert_eq!(args.positional_name(), None);
        assert_eq!(args.library, DEFAULT_LIBRARY);
        assert!(!args.force);
    }

    #[test]
    fn test_name_and_source() {
        let args = pull_args(&["imgpull", "pull", "-F", "-U", "my.img", "docker://ubuntu"]);
        assert_eq!(args.source(), "docker://ubuntu");
        assert_eq!(args.positional_name(), Some("my.img"));
        assert!(args.force);
        assert!(args.allow_unauthenticated);
    }

    #[test]
    fn test_registry_flags() {
        let args = pull_args(&[
            "imgpull",
            "pull",
            "--nohttps",
            "--docker-username",
            "bob",
            "--docker-password",
            "hunter2",
            "--tmpdir",
            "/scratch",
            "docker://ubuntu:20.04",
        ]);
        assert!(args.nohttps);
        assert_eq!(args.docker_username.as_deref(), Some("bob"));
        assert_eq!(args.docker_password.as_deref(), Some("hunter2"));
        assert_eq!(args.tmpdir, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn test_too_many_positionals() {
        assert!(Cli::try_parse_from(["imgpull", "pull", "a", "b", "c"]).is_err());
        assert!(Cli::try_parse_from(["imgpull", "pull"]).is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["imgpull", "-v", "-q", "pull", "alpine"]).is_err());
    }
}
