//! Persistent record of applied resources
//!
//! Manages the `.groundwork/state.json` file that tracks what has actually
//! been applied. The store is the idempotency anchor: the executor writes
//! one record per successfully applied resource before moving on, so an
//! interrupted run resumes exactly where it stopped.

use crate::provider::ProviderHandle;
use chrono::{DateTime, Utc};
use groundwork_core::{ResourceKind, ResourceSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_FILE: &str = "state.json";
const STATE_TMP: &str = "state.json.tmp";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// State persistence errors.
///
/// Fatal for the current invocation: the executor aborts rather than guess
/// at what was applied.
#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("state IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state file version {found} is newer than supported version {supported}")]
    Version { found: u32, supported: u32 },

    #[error("state is locked by {holder} since {since}")]
    Locked {
        holder: String,
        since: DateTime<Utc>,
    },
}

pub type StateResult<T> = std::result::Result<T, StateStoreError>;

/// Last-known-applied record for one resource id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedRecord {
    pub kind: ResourceKind,

    /// Whether the resource is believed to exist on the provider side
    pub exists: bool,

    pub provider_handle: Option<ProviderHandle>,

    /// Hash of the spec attributes at the last successful apply
    pub spec_hash: Option<String>,

    /// Dependency edges captured at apply time, so deletes can be
    /// reverse-ordered even after the resource left the stack file
    #[serde(default)]
    pub depends_on: Vec<String>,

    pub last_applied_at: DateTime<Utc>,
}

impl ObservedRecord {
    /// Record for a spec that was just applied successfully
    pub fn applied(spec: &ResourceSpec, handle: ProviderHandle) -> Self {
        Self {
            kind: spec.kind,
            exists: true,
            provider_handle: Some(handle),
            spec_hash: Some(spec.spec_hash()),
            depends_on: spec.depends_on.clone(),
            last_applied_at: Utc::now(),
        }
    }

    /// Record for a resource whose deletion the provider confirmed
    pub fn deleted(kind: ResourceKind) -> Self {
        Self {
            kind,
            exists: false,
            provider_handle: None,
            spec_hash: None,
            depends_on: Vec::new(),
            last_applied_at: Utc::now(),
        }
    }
}

/// Everything recorded as applied, keyed by resource id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    pub resources: BTreeMap<String, ObservedRecord>,
}

impl Default for ObservedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl ObservedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&ObservedRecord> {
        self.resources.get(id)
    }

    /// Resources currently believed to exist
    pub fn existing(&self) -> impl Iterator<Item = (&String, &ObservedRecord)> {
        self.resources.iter().filter(|(_, r)| r.exists)
    }
}

/// File-backed store for [`ObservedState`].
///
/// Every mutation is persisted atomically (temp file + rename) before the
/// call returns; the previous state file is kept as a backup.
pub struct StateStore {
    dir: PathBuf,
    state: ObservedState,
}

impl StateStore {
    /// Open the store under a state directory, loading existing state if
    /// present
    pub async fn open(dir: impl AsRef<Path>) -> StateResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(STATE_FILE);

        let state = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let state: ObservedState = serde_json::from_str(&content)?;

            if state.version > STATE_VERSION {
                return Err(StateStoreError::Version {
                    found: state.version,
                    supported: STATE_VERSION,
                });
            }

            tracing::debug!("loaded state with {} resources", state.resources.len());
            state
        } else {
            tracing::debug!("state file not found, starting from empty state");
            ObservedState::new()
        };

        Ok(Self { dir, state })
    }

    pub fn observed(&self) -> &ObservedState {
        &self.state
    }

    pub fn get(&self, id: &str) -> Option<&ObservedRecord> {
        self.state.get(id)
    }

    /// Atomic full-record replace, persisted before returning
    pub async fn put(&mut self, id: impl Into<String>, record: ObservedRecord) -> StateResult<()> {
        self.state.resources.insert(id.into(), record);
        self.state.updated_at = Utc::now();
        self.save().await
    }

    /// Drop a record entirely, persisted before returning
    pub async fn remove(&mut self, id: &str) -> StateResult<()> {
        if self.state.resources.remove(id).is_some() {
            self.state.updated_at = Utc::now();
            self.save().await?;
        }
        Ok(())
    }

    async fn save(&self) -> StateResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
            tracing::debug!("created state directory: {}", self.dir.display());
        }

        let path = self.dir.join(STATE_FILE);
        let tmp = self.dir.join(STATE_TMP);
        let backup = self.dir.join(STATE_BACKUP);

        // Keep the previous state as a backup before replacing it
        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::copy(&path, &backup).await?;
        }

        // Write to a temp file and rename, so a crash never leaves a
        // partially-written state.json
        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("saved state with {} resources", self.state.resources.len());
        Ok(())
    }

    /// Acquire the writer lock for this state directory
    pub async fn acquire_lock(&self) -> StateResult<StateLock> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        let lock_path = self.dir.join(LOCK_FILE);

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Take over locks older than 1 hour
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(StateStoreError::Locked {
                    holder: lock_info.holder,
                    since: lock_info.acquired_at,
                });
            }

            tracing::warn!("removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> StateResult<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Synchronous cleanup in drop - not ideal but necessary
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
