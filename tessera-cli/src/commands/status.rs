//! `tessera status` command - Show applied and pending migrations.

use tessera_migrate::HistoryStore;

use crate::cli::StatusArgs;
use crate::config::Project;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the status command
pub async fn run(args: StatusArgs) -> CliResult<()> {
    output::header("Migration Status");

    let project = Project::discover(&args.project)?;
    let engine = super::open_engine(&project, false);
    output::path("Migrations", &engine.config().migrations_dir);
    output::newline();

    let records = engine.history().load().await?;
    if records.is_empty() {
        output::info("No migrations found");
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        output::record(i + 1, record);
    }
    output::newline();

    // Fails on history that does not replay.
    let schema = engine.current_schema().await?;
    let status = engine.status().await?;

    output::kv("Total", &status.total().to_string());
    output::kv("Applied", &status.applied.len().to_string());
    output::kv("Pending", &status.pending.len().to_string());
    output::kv("Tables", &schema.len().to_string());
    output::newline();

    if status.is_up_to_date() {
        success("All migrations applied");
    } else {
        output::warn(&format!("{} migrations pending", status.pending.len()));
    }

    Ok(())
}
