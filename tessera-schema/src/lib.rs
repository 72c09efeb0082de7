//! # tessera-schema
//!
//! Model definitions and the canonical schema for the Tessera migration
//! engine.
//!
//! This crate provides:
//! - Declarative model definitions loaded from `models.toml` files
//! - Canonical, presentation-free schema types
//! - Schema extraction from models, with implicit foreign keys and join tables
//! - Side tables for presentation metadata and exposed methods
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_schema::{ModelSet, SchemaExtractor};
//!
//! let models = ModelSet::load("tessera/models.toml")?;
//! let extraction = SchemaExtractor::new().extract(&models)?;
//!
//! for table in extraction.schema.tables() {
//!     println!("{} ({} columns)", table.name, table.columns.len());
//! }
//! ```

pub mod annotations;
pub mod error;
pub mod extract;
pub mod model;
pub mod naming;
pub mod schema;

pub use annotations::{AnnotationMap, CapabilityMap, ColumnAnnotation, TableAnnotations};
pub use error::{SchemaError, SchemaResult};
pub use extract::{Extraction, SchemaExtractor};
pub use model::{
    AssociationDeclaration, FieldDefinition, FieldKind, IndexDeclaration, ModelDefinition,
    ModelSet,
};
pub use schema::{
    AssociationDefinition, AssociationKind, ColumnDefinition, DataKind, DefaultValue,
    IndexDefinition, JoinTable, SchemaDefinition, TableSchema,
};
