//! Migration engine implementation.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tessera_schema::{ModelSet, SchemaDefinition, SchemaError, SchemaExtractor};

use crate::diff::{SchemaDiff, SchemaDiffer};
use crate::error::{MigrateResult, MigrationError};
use crate::history::{HistoryStore, MigrationRecord};
use crate::naming::IdAssigner;
use crate::replay::replay;
use crate::synth::{MigrationDraft, Synthesizer};

/// Configuration for the migration engine.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Whether to compute records without writing them.
    pub dry_run: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./tessera/migrations"),
            dry_run: false,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// A record was generated and appended to history.
    Generated(MigrationRecord),
    /// A record was generated but not written (dry run).
    DryRun(MigrationRecord),
    /// The models match history; nothing was written.
    NoChangesDetected,
}

impl GenerationOutcome {
    /// The generated record, if any.
    pub fn record(&self) -> Option<&MigrationRecord> {
        match self {
            Self::Generated(record) | Self::DryRun(record) => Some(record),
            Self::NoChangesDetected => None,
        }
    }

    /// Check if the run found no changes.
    pub fn is_no_changes(&self) -> bool {
        matches!(self, Self::NoChangesDetected)
    }
}

/// What a generation run would do, computed without writing anything.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Schema reconstructed from history.
    pub base: SchemaDefinition,
    /// Schema extracted from the models.
    pub target: SchemaDefinition,
    /// Raw diff.
    pub diff: SchemaDiff,
    /// Folded and inverted operations, absent when nothing changed.
    pub draft: Option<MigrationDraft>,
    /// Data loss warnings.
    pub warnings: Vec<String>,
}

impl MigrationPlan {
    /// Check if there's anything to generate.
    pub fn is_empty(&self) -> bool {
        self.draft.is_none()
    }

    /// Get a summary of the plan.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            "No schema changes detected".to_string()
        } else {
            self.diff.summary()
        }
    }
}

/// Applied and pending migrations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    /// IDs of applied migrations.
    pub applied: Vec<String>,
    /// IDs of migrations not yet applied.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Total number of migrations.
    pub fn total(&self) -> usize {
        self.applied.len() + self.pending.len()
    }

    /// Check if everything is applied.
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    /// ID of the newest migration.
    pub fn latest(&self) -> Option<&str> {
        self.applied
            .iter()
            .chain(&self.pending)
            .map(String::as_str)
            .max()
    }
}

/// The migration synthesis engine.
///
/// Each run is a pure function of the models and a history snapshot: replay
/// history, extract the target schema, diff, synthesize, name, append.
pub struct MigrationEngine<H: HistoryStore> {
    config: MigrationConfig,
    history: H,
    extractor: SchemaExtractor,
    synthesizer: Synthesizer,
    assigner: IdAssigner,
}

impl<H: HistoryStore> MigrationEngine<H> {
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, history: H) -> Self {
        Self {
            config,
            history,
            extractor: SchemaExtractor::new(),
            synthesizer: Synthesizer::new(),
            assigner: IdAssigner::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the history store.
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Schema reconstructed by replaying the full history.
    pub async fn current_schema(&self) -> MigrateResult<SchemaDefinition> {
        let records = self.history.load().await?;
        replay(&records)
    }

    /// Records not yet applied by the external runner, oldest first.
    pub async fn pending(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let records = self.history.load().await?;
        Ok(records.into_iter().filter(|r| !r.applied).collect())
    }

    /// Applied and pending migration IDs.
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let records = self.history.load().await?;
        let (applied, pending): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| r.applied);
        Ok(MigrationStatus {
            applied: applied.into_iter().map(|r| r.id).collect(),
            pending: pending.into_iter().map(|r| r.id).collect(),
        })
    }

    /// Compute what [`generate`](Self::generate) would produce without
    /// locking or writing.
    pub async fn plan(&self, models: &ModelSet) -> MigrateResult<MigrationPlan> {
        let records = self.history.load().await?;
        self.plan_from(models, &records)
    }

    fn plan_from(
        &self,
        models: &ModelSet,
        records: &[MigrationRecord],
    ) -> MigrateResult<MigrationPlan> {
        let base = replay(records)?;
        let target = self
            .extractor
            .extract(models)
            .map_err(|e| match e {
                SchemaError::MissingName { kind, model } => {
                    MigrationError::inconsistent(model, format!("{} has no name", kind))
                }
                other => MigrationError::Schema(other),
            })?
            .schema;

        let diff = SchemaDiffer::new(target.clone())
            .with_base(base.clone())
            .diff()?;
        let draft = self.synthesizer.synthesize(diff.operations.clone())?;
        if let Some(draft) = &draft {
            draft.verify(&base)?;
        }

        Ok(MigrationPlan {
            warnings: diff.warnings(),
            base,
            target,
            diff,
            draft,
        })
    }

    /// Generate a migration for the current models, timestamped now.
    pub async fn generate(
        &self,
        models: &ModelSet,
        name: Option<&str>,
    ) -> MigrateResult<GenerationOutcome> {
        self.generate_at(models, name, Utc::now()).await
    }

    /// Generate a migration for the current models, timestamped `now`.
    ///
    /// The history lock is held for the whole run. Nothing is written unless
    /// every step succeeds.
    pub async fn generate_at(
        &self,
        models: &ModelSet,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> MigrateResult<GenerationOutcome> {
        let _lock = self.history.acquire_lock().await?;

        let records = self.history.load().await?;
        let plan = self.plan_from(models, &records)?;

        let Some(draft) = plan.draft else {
            tracing::info!(migrations = records.len(), "No schema changes detected");
            return Ok(GenerationOutcome::NoChangesDetected);
        };
        for warning in &plan.warnings {
            tracing::warn!("{}", warning);
        }

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let id = self.assigner.assign(&draft.up, name, &ids, now);
        let record = MigrationRecord::new(id, draft.up, draft.down, now)?
            .with_description(plan.diff.summary());

        if self.config.dry_run {
            tracing::info!(migration = %record.id, "Dry run; migration not written");
            return Ok(GenerationOutcome::DryRun(record));
        }

        self.history.append(&record).await?;
        tracing::info!(
            migration = %record.id,
            operations = record.up.len(),
            "Generated migration"
        );
        Ok(GenerationOutcome::Generated(record))
    }
}
