//! `tessera generate` command - Synthesize a migration from model changes.

use tessera_migrate::GenerationOutcome;
use tessera_schema::ModelSet;

use crate::cli::GenerateArgs;
use crate::config::Project;
use crate::error::{CliError, CliResult};
use crate::output::{self, success};

/// Run the generate command
pub async fn run(args: GenerateArgs) -> CliResult<()> {
    output::header("Generate Migration");

    let project = Project::discover(&args.project)?;
    let models_path = project.models_path(args.models.as_deref());
    if !models_path.exists() {
        return Err(CliError::Config(format!(
            "Model file not found: {}",
            models_path.display()
        )));
    }
    let engine = super::open_engine(&project, args.dry_run);

    output::path("Models", &models_path);
    output::path("Migrations", &engine.config().migrations_dir);
    output::newline();

    let models = ModelSet::load(&models_path)?;
    output::dim(&format!("Loaded {} models", models.len()));
    let outcome = engine.generate(&models, args.name.as_deref()).await?;
    output::newline();

    let record = match &outcome {
        GenerationOutcome::NoChangesDetected => {
            output::info("No schema changes detected");
            return Ok(());
        }
        GenerationOutcome::Generated(record) | GenerationOutcome::DryRun(record) => record,
    };

    output::section(&format!("{} operations", record.up.len()));
    for op in &record.up {
        output::operation(op);
    }
    output::newline();

    for op in record.up.iter().filter(|op| op.is_destructive()) {
        output::warn(&format!("{} may lose data", op.describe()));
    }

    if matches!(outcome, GenerationOutcome::DryRun(_)) {
        output::info(&format!("Dry run: migration '{}' not written", record.id));
    } else {
        success(&format!("Migration '{}' created", record.id));
        output::path("Written to", &engine.history().record_path(&record.id));
    }

    Ok(())
}
