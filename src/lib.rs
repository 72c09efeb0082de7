//! # Tessera
//!
//! Migration synthesis for declarative data models.
//!
//! Tessera provides:
//! - Declarative model definitions with implicit foreign keys and join tables
//! - A canonical schema, free of presentation metadata
//! - Schema reconstruction by replaying migration history
//! - Ordered, dependency-aware schema diffing
//! - Reversible migration records with sortable, collision-free IDs
//!
//! Tessera never executes migrations. It only appends records that an
//! external runner applies.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let models = ModelSet::load("tessera/models.toml")?;
//!
//!     let config = MigrationConfig::new().migrations_dir("tessera/migrations");
//!     let history = FileHistoryStore::new(&config.migrations_dir);
//!     let engine = MigrationEngine::new(config, history);
//!
//!     match engine.generate(&models, None).await? {
//!         GenerationOutcome::Generated(record) => println!("Created {}", record.id),
//!         GenerationOutcome::DryRun(record) => println!("Would create {}", record.id),
//!         GenerationOutcome::NoChangesDetected => println!("Up to date"),
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Model definitions, canonical schema types and extraction.
pub mod schema {
    pub use tessera_schema::*;
}

/// History, diffing and migration synthesis.
pub mod migrate {
    pub use tessera_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        FileHistoryStore, GenerationOutcome, HistoryStore, MigrationConfig, MigrationEngine,
        MigrationRecord, SchemaOperation,
    };
    pub use crate::schema::{ModelSet, SchemaDefinition, SchemaExtractor};
}

// Re-export key types at the crate root
pub use migrate::{MigrationEngine, MigrationError};
pub use schema::{SchemaDefinition, SchemaError};
