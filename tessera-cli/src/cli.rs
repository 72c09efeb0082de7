//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Tessera CLI - Migration synthesis for declarative models
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author = "Tessera Contributors")]
#[command(version)]
#[command(about = "Tessera CLI - Migration synthesis for declarative models", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a migration from model changes
    Generate(GenerateArgs),

    /// Show applied and pending migrations
    Status(StatusArgs),

    /// Print the schema reconstructed from migration history
    Schema(SchemaArgs),

    /// Display version information
    Version,
}

/// Options shared by every command that reads history
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Path to the config file (defaults to ./tessera.toml)
    #[arg(short, long, env = "TESSERA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Migrations directory (overrides the config file)
    #[arg(long)]
    pub migrations: Option<PathBuf>,
}

// =============================================================================
// Generate Command
// =============================================================================

/// Arguments for the `generate` command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Name for the migration (defaults to a name derived from the changes)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Path to the model file (overrides the config file)
    #[arg(short, long)]
    pub models: Option<PathBuf>,

    /// Compute the migration without writing it
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

// =============================================================================
// Status Command
// =============================================================================

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

// =============================================================================
// Schema Command
// =============================================================================

/// Arguments for the `schema` command
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Print compact JSON instead of pretty JSON
    #[arg(long)]
    pub compact: bool,

    #[command(flatten)]
    pub project: ProjectArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_args() {
        let cli = Cli::parse_from(["tessera", "generate", "--name", "add roles", "--dry-run"]);
        match cli.command {
            Command::Generate(args) => {
                assert_eq!(args.name.as_deref(), Some("add roles"));
                assert!(args.dry_run);
                assert!(args.models.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_generate_needs_no_arguments() {
        let cli = Cli::parse_from(["tessera", "generate"]);
        assert!(matches!(cli.command, Command::Generate(_)));
    }
}
