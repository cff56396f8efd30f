use std::process::ExitCode;

use clap::Parser;
use imgpull::cli::{Cli, Commands};
use imgpull::{observability, pull};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // Flags read their IMGPULL_* variables during parsing
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    observability::init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Pull(args) => match pull::execute(&args).await {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e}");
                ExitCode::from(e.exit_code())
            }
        },
    }
}
