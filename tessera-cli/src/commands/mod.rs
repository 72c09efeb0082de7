//! CLI command implementations.

use tessera_migrate::{FileHistoryStore, MigrationConfig, MigrationEngine};

use crate::config::Project;

pub mod generate;
pub mod schema;
pub mod status;
pub mod version;

/// Build an engine over the project's migrations directory.
fn open_engine(project: &Project, dry_run: bool) -> MigrationEngine<FileHistoryStore> {
    let config = MigrationConfig::new()
        .migrations_dir(project.migrations_dir())
        .dry_run(dry_run);
    let history = FileHistoryStore::new(&config.migrations_dir);
    MigrationEngine::new(config, history)
}
