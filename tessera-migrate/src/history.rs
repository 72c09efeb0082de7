//! Migration records and history storage.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{MigrateResult, MigrationError};
use crate::operation::SchemaOperation;

/// Name of the advisory lock file inside a migrations directory.
pub const LOCK_FILE: &str = ".tessera.lock";

/// A generated migration.
///
/// Records are immutable once written. Only `applied` changes afterwards,
/// and only through [`HistoryStore::set_applied`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration ID (`<timestamp>-<slug>`).
    pub id: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the record was generated.
    pub created_at: DateTime<Utc>,
    /// Whether an external runner has applied it.
    #[serde(default)]
    pub applied: bool,
    /// SHA-256 of the serialized up-operations.
    pub checksum: String,
    /// Operations that move the schema forward.
    pub up: Vec<SchemaOperation>,
    /// Operations that undo `up`, already in execution order.
    pub down: Vec<SchemaOperation>,
}

impl MigrationRecord {
    /// Create a record and compute its checksum.
    pub fn new(
        id: impl Into<String>,
        up: Vec<SchemaOperation>,
        down: Vec<SchemaOperation>,
        created_at: DateTime<Utc>,
    ) -> MigrateResult<Self> {
        let checksum = compute_checksum(&up)?;
        Ok(Self {
            id: id.into(),
            description: None,
            created_at,
            applied: false,
            checksum,
            up,
            down,
        })
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the stored checksum against the up-operations.
    pub fn verify_checksum(&self) -> MigrateResult<()> {
        let actual = compute_checksum(&self.up)?;
        if actual != self.checksum {
            return Err(MigrationError::ChecksumMismatch {
                id: self.id.clone(),
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Compute the checksum of a sequence of operations.
pub fn compute_checksum(ops: &[SchemaOperation]) -> MigrateResult<String> {
    let bytes = serde_json::to_vec(ops)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Order records by ID and reject duplicates and tampered records.
fn check_history(mut records: Vec<MigrationRecord>) -> MigrateResult<Vec<MigrationRecord>> {
    records.sort_by(|a, b| a.id.cmp(&b.id));
    let mut seen = HashSet::new();
    for record in &records {
        if !seen.insert(record.id.as_str()) {
            return Err(MigrationError::DuplicateMigration(record.id.clone()));
        }
        record.verify_checksum()?;
    }
    Ok(records)
}

/// Persistent migration history.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load every record in chronological (ID) order, verifying checksums.
    async fn load(&self) -> MigrateResult<Vec<MigrationRecord>>;

    /// Append a new record. Fails if the ID is taken.
    async fn append(&self, record: &MigrationRecord) -> MigrateResult<()>;

    /// Set a record's applied flag.
    async fn set_applied(&self, id: &str, applied: bool) -> MigrateResult<()>;

    /// Acquire an exclusive lock for a generation run.
    async fn acquire_lock(&self) -> MigrateResult<HistoryLock>;
}

/// Exclusive lock on a history store, released on drop.
pub struct HistoryLock {
    holder: String,
    release_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl HistoryLock {
    /// Create a new lock.
    pub fn new(holder: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            holder: holder.into(),
            release_fn: Some(Box::new(release)),
        }
    }

    /// Describe who holds the lock.
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl std::fmt::Debug for HistoryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLock")
            .field("holder", &self.holder)
            .finish()
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        if let Some(release) = self.release_fn.take() {
            release();
        }
    }
}

/// History stored as one JSON file per record.
///
/// ```text
/// tessera/migrations/
/// ├── 20240101120000-create-Users.json
/// ├── 20240102090000-update-schema.json
/// └── .tessera.lock        # present while a run holds the lock
/// ```
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Create a store over a migrations directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the migrations directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding a record.
    pub fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn staging_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", id))
    }

    /// Write `contents` next to `path` and rename it into place, so a reader
    /// never sees a partial record.
    async fn write_record_file(&self, id: &str, path: &Path, contents: &str) -> MigrateResult<()> {
        let staging = self.staging_path(id);
        let written = async {
            let mut file = tokio::fs::File::create(&staging).await?;
            file.write_all(contents.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.sync_all().await?;
            tokio::fs::rename(&staging, path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                tracing::warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging file");
            }
            return Err(MigrationError::Io(e));
        }
        Ok(())
    }

    async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(MigrationError::Io)?;
        Ok(())
    }

    async fn read_record(&self, path: &Path) -> MigrateResult<MigrationRecord> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(MigrationError::Io)?;
        let record: MigrationRecord = serde_json::from_str(&content)?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != record.id {
            return Err(MigrationError::invalid_migration(format!(
                "{} holds migration '{}'",
                path.display(),
                record.id
            )));
        }
        Ok(record)
    }
}

#[async_trait::async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self) -> MigrateResult<Vec<MigrationRecord>> {
        if !tokio::fs::try_exists(&self.dir)
            .await
            .map_err(MigrationError::Io)?
        {
            tracing::debug!(dir = %self.dir.display(), "No migrations directory yet");
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(MigrationError::Io)?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(MigrationError::Io)? {
            let path = entry.path();
            let is_file = entry.file_type().await.map_err(MigrationError::Io)?.is_file();
            if is_file && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            records.push(self.read_record(&path).await?);
        }

        let records = check_history(records)?;
        tracing::debug!(
            dir = %self.dir.display(),
            migrations = records.len(),
            "Loaded migration history"
        );
        Ok(records)
    }

    async fn append(&self, record: &MigrationRecord) -> MigrateResult<()> {
        self.ensure_dir().await?;

        let path = self.record_path(&record.id);
        let json = serde_json::to_string_pretty(record)?;

        // Callers hold the history lock.
        if tokio::fs::try_exists(&path)
            .await
            .map_err(MigrationError::Io)?
        {
            return Err(MigrationError::DuplicateMigration(record.id.clone()));
        }
        self.write_record_file(&record.id, &path, &json).await?;

        tracing::info!(migration = %record.id, path = %path.display(), "Wrote migration");
        Ok(())
    }

    async fn set_applied(&self, id: &str, applied: bool) -> MigrateResult<()> {
        let path = self.record_path(id);
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(MigrationError::Io)?
        {
            return Err(MigrationError::NotFound(id.to_string()));
        }

        let mut record = self.read_record(&path).await?;
        record.applied = applied;
        let json = serde_json::to_string_pretty(&record)?;
        self.write_record_file(id, &path, &json).await?;

        tracing::debug!(migration = %id, applied, "Updated applied flag");
        Ok(())
    }

    async fn acquire_lock(&self) -> MigrateResult<HistoryLock> {
        self.ensure_dir().await?;

        let path = self.dir.join(LOCK_FILE);
        let holder = format!("pid {}", std::process::id());
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(MigrationError::lock_failed(format!(
                    "{} exists; another run may be in progress (remove it if stale)",
                    path.display()
                )));
            }
            Err(e) => return Err(MigrationError::Io(e)),
        };
        file.write_all(holder.as_bytes())
            .await
            .map_err(MigrationError::Io)?;

        tracing::debug!(path = %path.display(), "Acquired history lock");
        Ok(HistoryLock::new(holder, move || {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to release history lock");
            }
        }))
    }
}

/// History held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    records: Arc<Mutex<Vec<MigrationRecord>>>,
    locked: Arc<Mutex<bool>>,
}

impl MemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with records.
    pub fn with_records(records: Vec<MigrationRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            locked: Arc::default(),
        }
    }

    /// Snapshot of the stored records, in insertion order.
    pub fn records(&self) -> Vec<MigrationRecord> {
        self.records.lock().clone()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait::async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> MigrateResult<Vec<MigrationRecord>> {
        check_history(self.records())
    }

    async fn append(&self, record: &MigrationRecord) -> MigrateResult<()> {
        let mut records = self.records.lock();
        if records.iter().any(|r| r.id == record.id) {
            return Err(MigrationError::DuplicateMigration(record.id.clone()));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn set_applied(&self, id: &str, applied: bool) -> MigrateResult<()> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| MigrationError::NotFound(id.to_string()))?;
        record.applied = applied;
        Ok(())
    }

    async fn acquire_lock(&self) -> MigrateResult<HistoryLock> {
        let mut locked = self.locked.lock();
        if *locked {
            return Err(MigrationError::lock_failed("in-memory history is locked"));
        }
        *locked = true;

        let flag = Arc::clone(&self.locked);
        Ok(HistoryLock::new("memory", move || *flag.lock() = false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tessera_schema::{ColumnDefinition, DataKind};

    fn create_users() -> SchemaOperation {
        SchemaOperation::CreateTable {
            table: "Users".into(),
            columns: vec![ColumnDefinition::new("username", DataKind::String).primary_key()],
            indexes: vec![],
        }
    }

    fn record(id: &str) -> MigrationRecord {
        let up = vec![create_users()];
        let down = vec![create_users().inverse().unwrap()];
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        MigrationRecord::new(id, up, down, created_at).unwrap()
    }

    #[test]
    fn test_checksum_is_stable() {
        let a = record("20240101120000-create-Users");
        let b = record("20240101120000-create-Users");
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(a.checksum.len(), 64);
        a.verify_checksum().unwrap();
    }

    #[test]
    fn test_tampered_record_detected() {
        let mut record = record("20240101120000-create-Users");
        record.up.clear();
        assert!(matches!(
            record.verify_checksum(),
            Err(MigrationError::ChecksumMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path().join("migrations"));

        assert!(store.load().await.unwrap().is_empty());

        let second = record("20240102000000-update-schema");
        let first = record("20240101120000-create-Users");
        store.append(&second).await.unwrap();
        store.append(&first).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![first.clone(), second]);
        assert!(store.record_path(&first.id).exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_duplicate() {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let record = record("20240101120000-create-Users");

        store.append(&record).await.unwrap();
        let err = store.append(&record).await.unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateMigration(_)));
    }

    #[tokio::test]
    async fn test_failed_append_leaves_history_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let first = record("20240101120000-create-Users");
        store.append(&first).await.unwrap();

        // A directory in the staging slot makes the write fail.
        let second = record("20240102000000-update-schema");
        std::fs::create_dir(dir.path().join(".20240102000000-update-schema.json.tmp")).unwrap();

        let err = store.append(&second).await.unwrap_err();
        assert!(matches!(err, MigrationError::Io(_)));
        assert!(!store.record_path(&second.id).exists());
        assert_eq!(store.load().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn test_append_leaves_no_staging_files() {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let record = record("20240101120000-create-Users");
        store.append(&record).await.unwrap();
        store.set_applied(&record.id, true).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["20240101120000-create-Users.json".to_string()]);
    }

    #[tokio::test]
    async fn test_file_store_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let mut record = record("20240101120000-create-Users");
        store.append(&record).await.unwrap();

        record.up.clear();
        let json = serde_json::to_string_pretty(&record).unwrap();
        std::fs::write(store.record_path(&record.id), json).unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, MigrationError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_file_store_set_applied() {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path());
        let record = record("20240101120000-create-Users");
        store.append(&record).await.unwrap();

        store.set_applied(&record.id, true).await.unwrap();
        assert!(store.load().await.unwrap()[0].applied);

        let err = store.set_applied("missing", true).await.unwrap_err();
        assert!(matches!(err, MigrationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_file_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let store = FileHistoryStore::new(dir.path());

        let lock = store.acquire_lock().await.unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());
        assert!(matches!(
            store.acquire_lock().await.unwrap_err(),
            MigrationError::LockFailed(_)
        ));

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
        store.acquire_lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryHistoryStore::new();
        store.append(&record("20240102000000-update-schema")).await.unwrap();
        store.append(&record("20240101120000-create-Users")).await.unwrap();

        let ids: Vec<_> = store.load().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec!["20240101120000-create-Users", "20240102000000-update-schema"]
        );

        let lock = store.acquire_lock().await.unwrap();
        assert!(store.acquire_lock().await.is_err());
        drop(lock);
        assert!(store.acquire_lock().await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicates_on_load() {
        let store = MemoryHistoryStore::with_records(vec![
            record("20240101120000-create-Users"),
            record("20240101120000-create-Users"),
        ]);
        assert!(matches!(
            store.load().await.unwrap_err(),
            MigrationError::DuplicateMigration(_)
        ));
    }
}
