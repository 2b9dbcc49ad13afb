//! Record backends for the CLI
//!
//! The memory backend is seeded from a JSON records file. After a successful
//! mutation only the records this run changed are merged back, under an
//! exclusive lock and only if nobody else moved them on disk in the meantime.
//! Overlapping invocations therefore get a `VersionConflict` instead of
//! silently overwriting each other.

use crate::config::{NodeConfig, StoreBackend};
use anyhow::{Context, Result};
use fs2::FileExt;
use poamflow_core::{RecordId, TenantId};
use poamflow_workflow::{InMemoryRecordStore, PoamRecord, RecordStore, WorkflowError};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Record versions as last read from (or written to) the records file
pub type VersionMap = HashMap<(TenantId, RecordId), u64>;

fn versions_of(records: &[PoamRecord]) -> VersionMap {
    records
        .iter()
        .map(|r| ((r.tenant_id.clone(), r.id.clone()), r.version))
        .collect()
}

/// JSON array of records on disk
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record; a missing file is an empty set
    pub fn load(&self) -> Result<Vec<PoamRecord>> {
        if !self.path.exists() {
            debug!("Records file {} not found, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read records file {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse records file {}", self.path.display()))
    }

    /// Merge `changed` into the file
    ///
    /// Every changed record must still be at its `baseline` version on disk
    /// (or absent, if it was created by this run), else nothing is written.
    pub fn commit(&self, changed: &[PoamRecord], baseline: &VersionMap) -> Result<()> {
        let lock = self.lock()?;
        let mut on_disk = self.load()?;

        for record in changed {
            let expected = baseline.get(&(record.tenant_id.clone(), record.id.clone()));
            let current = on_disk
                .iter()
                .find(|r| r.tenant_id == record.tenant_id && r.id == record.id)
                .map(|r| r.version);

            match (expected, current) {
                (Some(&expected), Some(actual)) if expected == actual => {}
                (None, None) => {}
                (None, Some(_)) => return Err(WorkflowError::AlreadyExists(record.key()).into()),
                (expected, actual) => {
                    return Err(WorkflowError::VersionConflict {
                        key: record.key(),
                        expected: expected.copied().unwrap_or(0),
                        actual: actual.unwrap_or(0),
                    }
                    .into())
                }
            }
        }

        for record in changed {
            match on_disk
                .iter_mut()
                .find(|r| r.tenant_id == record.tenant_id && r.id == record.id)
            {
                Some(slot) => *slot = record.clone(),
                None => on_disk.push(record.clone()),
            }
        }

        self.write(&on_disk)?;
        FileExt::unlock(&lock)
            .with_context(|| format!("Failed to unlock {}", self.lock_path().display()))?;

        debug!("Committed {} changed records to {}", changed.len(), self.path.display());
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Exclusive lock on the sibling `.lock` file, released when dropped
    fn lock(&self) -> Result<File> {
        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", path.display()))?;
        Ok(file)
    }

    /// Atomic replace; the temp file is removed if anything fails
    fn write(&self, records: &[PoamRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records).context("Failed to serialize records")?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

/// Opened record store plus what is needed to persist it afterwards
pub struct RecordBackend {
    store: Arc<dyn RecordStore>,
    memory: Option<FileBacked>,
}

struct FileBacked {
    store: InMemoryRecordStore,
    file: RecordFile,
    baseline: Mutex<VersionMap>,
}

impl RecordBackend {
    /// Open the configured backend
    pub async fn open(config: &NodeConfig, records: RecordFile) -> Result<Self> {
        match config.store.backend {
            StoreBackend::Memory => {
                let loaded = records.load()?;
                info!("Loaded {} records from {}", loaded.len(), records.path().display());

                let baseline = versions_of(&loaded);
                let store = InMemoryRecordStore::with_records(loaded);
                Ok(Self {
                    store: Arc::new(store.clone()),
                    memory: Some(FileBacked {
                        store,
                        file: records,
                        baseline: Mutex::new(baseline),
                    }),
                })
            }
            StoreBackend::Postgres => Self::open_postgres(config).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn open_postgres(config: &NodeConfig) -> Result<Self> {
        use poamflow_workflow::store::PostgresRecordStore;

        let url = config
            .store
            .database_url
            .as_deref()
            .context("Postgres backend requires store.database_url")?;
        let store = PostgresRecordStore::new(url).await?;
        store.run_migrations().await?;

        info!("Connected to PostgreSQL record store");
        Ok(Self {
            store: Arc::new(store),
            memory: None,
        })
    }

    #[cfg(not(feature = "postgres"))]
    async fn open_postgres(_config: &NodeConfig) -> Result<Self> {
        anyhow::bail!("This build does not include the postgres backend (enable the 'postgres' feature)")
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    /// Write this run's changes back to the records file; no-op for database stores
    ///
    /// Fails with [`WorkflowError::VersionConflict`] when another invocation
    /// committed a change to the same record after this one loaded it.
    pub async fn persist(&self) -> Result<()> {
        let Some(backed) = &self.memory else {
            return Ok(());
        };

        let mut baseline = backed.baseline.lock().await;
        let changed: Vec<PoamRecord> = backed
            .store
            .all_records()
            .await
            .into_iter()
            .filter(|r| baseline.get(&(r.tenant_id.clone(), r.id.clone())) != Some(&r.version))
            .collect();
        if changed.is_empty() {
            return Ok(());
        }

        backed.file.commit(&changed, &baseline)?;
        baseline.extend(versions_of(&changed));
        Ok(())
    }
}
