//! # tessera-migrate
//!
//! Migration synthesis for the Tessera model layer.
//!
//! This crate provides functionality for:
//! - Reconstructing the last-known schema by replaying migration history
//! - Diffing that schema against the schema extracted from the models
//! - Folding the diff into compact, reversible migration records
//! - Assigning sortable, collision-free migration IDs
//! - Storing history as JSON records on the filesystem
//!
//! ## Architecture
//!
//! No database is consulted. The history is the source of truth for what the
//! schema looked like after the last migration.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐
//! │ History      │────▶│ Replay         │──────┐
//! └──────────────┘     └────────────────┘      ▼
//!                                       ┌────────────────┐     ┌─────────────┐
//!                                       │ Schema Differ  │────▶│ Synthesizer │
//!                                       └────────────────┘     └─────────────┘
//! ┌──────────────┐     ┌────────────────┐      ▲                     │
//! │ Models       │────▶│ Extractor      │──────┘                     ▼
//! └──────────────┘     └────────────────┘                     ┌─────────────┐
//!                                                             │ ID Assigner │
//!                                                             └─────────────┘
//!                                                                    │
//!                                                                    ▼
//!                                                             ┌─────────────┐
//!                                                             │ New Record  │
//!                                                             └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_migrate::{FileHistoryStore, MigrationConfig, MigrationEngine};
//! use tessera_schema::ModelSet;
//!
//! async fn generate() -> Result<(), Box<dyn std::error::Error>> {
//!     let models = ModelSet::load("tessera/models.toml")?;
//!
//!     let config = MigrationConfig::new().migrations_dir("./tessera/migrations");
//!     let history = FileHistoryStore::new(&config.migrations_dir);
//!     let engine = MigrationEngine::new(config, history);
//!
//!     let plan = engine.plan(&models).await?;
//!     println!("Plan: {}", plan.summary());
//!
//!     let outcome = engine.generate(&models, None).await?;
//!     if let Some(record) = outcome.record() {
//!         println!("Generated {}", record.id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! Each record is a JSON file named after its ID:
//!
//! ```text
//! tessera/migrations/
//! ├── 20240101120000-create-Users.json
//! ├── 20240102093000-update-schema.json
//! └── .tessera.lock           (only while a generation run is active)
//! ```

pub mod diff;
pub mod engine;
pub mod error;
pub mod history;
pub mod naming;
pub mod operation;
pub mod replay;
pub mod synth;

pub use diff::{SchemaDiff, SchemaDiffer};
pub use engine::{
    GenerationOutcome, MigrationConfig, MigrationEngine, MigrationPlan, MigrationStatus,
};
pub use error::{MigrateResult, MigrationError, OperationError};
pub use history::{
    FileHistoryStore, HistoryLock, HistoryStore, LOCK_FILE, MemoryHistoryStore, MigrationRecord,
    compute_checksum,
};
pub use naming::IdAssigner;
pub use operation::SchemaOperation;
pub use replay::{apply, apply_all, replay};
pub use synth::{MigrationDraft, Synthesizer, fold};
