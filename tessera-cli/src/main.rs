//! Tessera CLI - Command-line interface for Tessera migration synthesis.

use clap::Parser;

use tessera_cli::cli::{Cli, Command};
use tessera_cli::commands;
use tessera_cli::error::CliResult;
use tessera_cli::{logging, output};

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => commands::generate::run(args).await,
        Command::Status(args) => commands::status::run(args).await,
        Command::Schema(args) => commands::schema::run(args).await,
        Command::Version => commands::version::run().await,
    }
}
