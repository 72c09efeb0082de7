//! CLI error types and result alias.

use miette::Diagnostic;
use thiserror::Error;

use tessera_migrate::MigrationError;
use tessera_schema::SchemaError;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(tessera::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(tessera::config))]
    Config(String),

    /// Model definition error
    #[error("Model error: {0}")]
    #[diagnostic(code(tessera::schema))]
    Schema(#[from] SchemaError),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(tessera::migration))]
    Migration(#[from] MigrationError),

    /// Output encoding error
    #[error("Output error: {0}")]
    #[diagnostic(code(tessera::output))]
    Output(#[from] serde_json::Error),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}
