//! Error types for the migration engine.

use std::fmt;

use tessera_schema::SchemaError;
use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// An operation that could not be applied to a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct OperationError {
    /// Operation kind (`create_table`, `add_column`, ...).
    pub operation: &'static str,
    /// Table the operation targets.
    pub table: String,
    /// Column the operation targets, if any.
    pub column: Option<String>,
    /// What went wrong.
    pub message: String,
}

impl OperationError {
    /// Create an operation error on a table.
    pub fn new(operation: &'static str, table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation,
            table: table.into(),
            column: None,
            message: message.into(),
        }
    }

    /// Attach the column the operation targets.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: {}",
            self.operation,
            location(&self.table, &self.column),
            self.message
        )
    }
}

/// Errors that can occur during migration synthesis.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// History could not be replayed.
    #[error("Replay of migration '{record}' failed at step {step}: {source}")]
    Replay {
        /// Migration ID.
        record: String,
        /// Zero-based index of the failing up-operation.
        step: usize,
        /// The failing operation.
        source: OperationError,
    },

    /// The target schema is internally inconsistent.
    #[error("Inconsistent target schema at {}: {message}", location(.table, .column))]
    DiffInconsistency {
        /// Table name.
        table: String,
        /// Column name, if any.
        column: Option<String>,
        /// What is inconsistent.
        message: String,
    },

    /// An operation has no structural inverse.
    #[error("Cannot invert {operation} on {}: {reason}", location(.table, .column))]
    UngeneratableInverse {
        /// Operation kind.
        operation: &'static str,
        /// Table name.
        table: String,
        /// Column name, if any.
        column: Option<String>,
        /// Why no inverse exists.
        reason: String,
    },

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration checksum mismatch.
    #[error("Checksum mismatch for migration '{id}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Migration ID.
        id: String,
        /// Checksum stored in the record.
        expected: String,
        /// Checksum of the record's operations.
        actual: String,
    },

    /// Two records share an ID.
    #[error("Duplicate migration '{0}'")]
    DuplicateMigration(String),

    /// Migration not found.
    #[error("Migration '{0}' not found")]
    NotFound(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire migration lock: {0}")]
    LockFailed(String),

    /// Model or schema error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Invalid migration record.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),
}

impl MigrationError {
    /// Create a replay error.
    pub fn replay(record: impl Into<String>, step: usize, source: OperationError) -> Self {
        Self::Replay {
            record: record.into(),
            step,
            source,
        }
    }

    /// Create a diff inconsistency error on a table.
    pub fn inconsistent(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiffInconsistency {
            table: table.into(),
            column: None,
            message: message.into(),
        }
    }

    /// Create a diff inconsistency error on a column.
    pub fn inconsistent_column(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DiffInconsistency {
            table: table.into(),
            column: Some(column.into()),
            message: message.into(),
        }
    }

    /// Create an ungeneratable inverse error.
    pub fn ungeneratable(
        operation: &'static str,
        table: impl Into<String>,
        column: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UngeneratableInverse {
            operation,
            table: table.into(),
            column,
            reason: reason.into(),
        }
    }

    /// Create a lock failed error.
    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::LockFailed(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Check if this is a recoverable error (lock contention).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LockFailed(_))
    }
}

fn location(table: &str, column: &Option<String>) -> String {
    match column {
        Some(column) => format!("`{}.{}`", table, column),
        None => format!("`{}`", table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_error_display() {
        let err = MigrationError::replay(
            "20240101000000-create-Users",
            2,
            OperationError::new("drop_column", "Users", "column does not exist")
                .with_column("email"),
        );
        let msg = err.to_string();
        assert!(msg.contains("20240101000000-create-Users"));
        assert!(msg.contains("step 2"));
        assert!(msg.contains("drop_column on `Users.email`"));
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = MigrationError::ChecksumMismatch {
            id: "test".to_string(),
            expected: "abc".to_string(),
            actual: "xyz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("xyz"));
    }

    #[test]
    fn test_inconsistency_display() {
        let err = MigrationError::inconsistent("Posts", "references missing table `Users`");
        assert_eq!(
            err.to_string(),
            "Inconsistent target schema at `Posts`: references missing table `Users`"
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(MigrationError::lock_failed("held by pid 42").is_recoverable());
        assert!(!MigrationError::DuplicateMigration("x".to_string()).is_recoverable());
    }
}
