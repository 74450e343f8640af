// src/store.rs
//! Resource Store: the only shared mutable state in the service.
//!
//! In-memory map of listing records with a tolerant JSON snapshot on disk.
//! Counts and metadata live in disjoint fields so the Watcher and the
//! Indexer can interleave writes to the same id without clobbering each
//! other (field-level last-writer-wins).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::types::{ListingMeta, ResourceId, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    /// `None` means "never observed", which is distinct from `Some(0)`.
    pub available_count: Option<u32>,
    #[serde(default)]
    pub metadata: Option<ListingMeta>,
    #[serde(default)]
    pub last_seen_by_watcher: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_by_indexer: Option<DateTime<Utc>>,
}

impl ResourceRecord {
    fn new(id: ResourceId) -> Self {
        Self {
            id,
            available_count: None,
            metadata: None,
            last_seen_by_watcher: None,
            last_seen_by_indexer: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub resources: usize,
    pub primed: bool,
    pub last_watch: Option<DateTime<Utc>>,
    pub last_index: Option<DateTime<Utc>>,
}

/// Read/write contract every other component goes through. Reads never
/// block on I/O; durability happens on `flush`.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get(&self, id: ResourceId) -> Option<ResourceRecord>;

    /// Replace (never merge) the stored count. Idempotent: writing the same
    /// value twice leaves the same observable count. Creates a minimal
    /// record when none exists.
    async fn upsert_count(
        &self,
        id: ResourceId,
        count: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Merge metadata fields only; `available_count` is never touched.
    async fn upsert_metadata(
        &self,
        id: ResourceId,
        meta: ListingMeta,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Whether at least one Watcher baseline pass has completed.
    async fn is_primed(&self) -> bool;

    async fn mark_primed(&self) -> Result<(), StoreError>;

    /// Snapshot the in-memory map to durable storage.
    async fn flush(&self) -> Result<(), StoreError>;

    async fn stats(&self) -> StoreStats;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    primed: bool,
    #[serde(default)]
    records: HashMap<ResourceId, ResourceRecord>,
    #[serde(default)]
    last_watch: Option<DateTime<Utc>>,
    #[serde(default)]
    last_index: Option<DateTime<Utc>>,
}

/// JSON-file-backed store. Mutations are in-memory; `flush` writes the
/// whole snapshot once per cycle.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<PersistedState>,
}

impl FileStore {
    /// Load state from `path`. A missing or unreadable file starts cold; a
    /// corrupt file is logged and discarded rather than crashing the boot.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "state file corrupt, starting cold");
                PersistedState::default()
            }),
            Err(_) => PersistedState::default(),
        };
        Self {
            path,
            inner: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersistedState> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

#[async_trait]
impl ResourceStore for FileStore {
    async fn get(&self, id: ResourceId) -> Option<ResourceRecord> {
        self.lock().records.get(&id).cloned()
    }

    async fn upsert_count(
        &self,
        id: ResourceId,
        count: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut st = self.lock();
        let rec = st
            .records
            .entry(id)
            .or_insert_with(|| ResourceRecord::new(id));
        rec.available_count = Some(count);
        rec.last_seen_by_watcher = Some(now);
        st.last_watch = Some(now);
        Ok(())
    }

    async fn upsert_metadata(
        &self,
        id: ResourceId,
        meta: ListingMeta,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut st = self.lock();
        let rec = st
            .records
            .entry(id)
            .or_insert_with(|| ResourceRecord::new(id));
        rec.metadata = Some(meta);
        rec.last_seen_by_indexer = Some(now);
        st.last_index = Some(now);
        Ok(())
    }

    async fn is_primed(&self) -> bool {
        self.lock().primed
    }

    async fn mark_primed(&self) -> Result<(), StoreError> {
        self.lock().primed = true;
        Ok(())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let snapshot = self.lock().clone();
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        fs::write(&self.path, bytes).await?;
        Ok(())
    }

    async fn stats(&self) -> StoreStats {
        let st = self.lock();
        StoreStats {
            resources: st.records.len(),
            primed: st.primed,
            last_watch: st.last_watch,
            last_index: st.last_index,
        }
    }
}
