//! CLI entry point - the composition root.

use std::process::ExitCode;

use clap::Parser;
use unsub_cli::{Cli, Commands, handlers, logging};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = logging::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => handlers::run::execute(&args).await,
        Commands::Status(args) => handlers::status::execute(&args).await,
    }
}
