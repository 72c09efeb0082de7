//! Error types for model loading and schema extraction.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while loading model definitions or extracting a schema.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a model file.
    #[error("failed to read file: {path}")]
    #[diagnostic(code(tessera::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The model file is not valid TOML or does not match the model format.
    #[error("failed to parse model definitions")]
    #[diagnostic(
        code(tessera::schema::toml_error),
        help("model files contain `[[model]]` tables with `[[model.field]]` entries")
    )]
    TomlError {
        #[source]
        source: toml::de::Error,
    },

    /// Invalid model definition.
    #[error("invalid model `{name}`: {message}")]
    #[diagnostic(code(tessera::schema::invalid_model))]
    InvalidModel { name: String, message: String },

    /// Invalid field definition.
    #[error("invalid field `{model}.{field}`: {message}")]
    #[diagnostic(code(tessera::schema::invalid_field))]
    InvalidField {
        model: String,
        field: String,
        message: String,
    },

    /// Invalid association definition.
    #[error("invalid association `{model}` -> `{target}`: {message}")]
    #[diagnostic(code(tessera::schema::invalid_association))]
    InvalidAssociation {
        model: String,
        target: String,
        message: String,
    },

    /// Invalid index definition.
    #[error("invalid index `{name}` on `{model}`: {message}")]
    #[diagnostic(code(tessera::schema::invalid_index))]
    InvalidIndex {
        model: String,
        name: String,
        message: String,
    },

    /// A model, table, or field declared without a name.
    #[error("{kind} name must not be empty (in model `{model}`)")]
    #[diagnostic(code(tessera::schema::missing_name))]
    MissingName { kind: &'static str, model: String },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(tessera::schema::duplicate))]
    Duplicate { kind: String, name: String },
}

impl SchemaError {
    /// Create an invalid model error.
    pub fn invalid_model(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a missing name error.
    pub fn missing_name(kind: &'static str, model: impl Into<String>) -> Self {
        Self::MissingName {
            kind,
            model: model.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            model: model.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid association error.
    pub fn invalid_association(
        model: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAssociation {
            model: model.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create an invalid index error.
    pub fn invalid_index(
        model: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidIndex {
            model: model.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl From<toml::de::Error> for SchemaError {
    fn from(source: toml::de::Error) -> Self {
        Self::TomlError { source }
    }
}
