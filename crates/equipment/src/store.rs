//! Storage trait and implementations

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    source_hash, Dataset, DatasetId, MeasurementRecord, RetentionPolicy, RetentionSlot, StoreError,
    StoreResult,
};

/// Persistence collaborator for datasets and their records.
///
/// A dataset starts as an uncommitted shell holding the raw upload. Shells are
/// invisible to [`dataset`](DatasetStore::dataset), [`recent`](DatasetStore::recent)
/// and [`records`](DatasetStore::records), and are not counted for retention.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Persists an uncommitted shell with the raw upload.
    async fn create_pending(&self, name: &str, source: &[u8]) -> StoreResult<Dataset>;

    /// Raw upload of a dataset, committed or not.
    async fn source(&self, id: DatasetId) -> StoreResult<Option<Vec<u8>>>;

    /// Commits a shell together with all of its records.
    ///
    /// Runs `policy` over the other committed datasets and deletes what it
    /// selects in the same unit; that unit is serialized against every other
    /// commit on the store. Returns the evicted ids. On error nothing changes.
    async fn commit(
        &self,
        id: DatasetId,
        records: &[MeasurementRecord],
        policy: RetentionPolicy,
    ) -> StoreResult<Vec<DatasetId>>;

    /// Deletes an uncommitted shell. Committed datasets are left alone.
    async fn discard(&self, id: DatasetId) -> StoreResult<bool>;

    async fn dataset(&self, id: DatasetId) -> StoreResult<Option<Dataset>>;

    /// Records of a committed dataset in file order.
    async fn records(&self, id: DatasetId, limit: Option<usize>) -> StoreResult<Vec<MeasurementRecord>>;

    /// Committed datasets, most recent first.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<Dataset>>;

    /// Removes shells left behind by interrupted ingests.
    async fn purge_pending(&self) -> StoreResult<u64>;
}

struct Entry {
    dataset: Dataset,
    source: Vec<u8>,
    committed: bool,
    records: Vec<MeasurementRecord>,
}

#[derive(Default)]
struct Inner {
    next_id: DatasetId,
    entries: BTreeMap<DatasetId, Entry>,
}

impl Inner {
    fn committed(&self, id: DatasetId) -> Option<&Entry> {
        self.entries.get(&id).filter(|e| e.committed)
    }
}

/// In-memory store (for testing and local runs)
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed plus uncommitted entries.
    pub fn len_including_pending(&self) -> StoreResult<usize> {
        Ok(self.lock()?.entries.len())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl DatasetStore for InMemoryStore {
    async fn create_pending(&self, name: &str, source: &[u8]) -> StoreResult<Dataset> {
        let mut inner = self.lock()?;
        inner.next_id += 1;

        let dataset = Dataset {
            id: inner.next_id,
            name: name.to_string(),
            created_at: Utc::now(),
            source_hash: source_hash(source),
        };
        inner.entries.insert(
            dataset.id,
            Entry {
                dataset: dataset.clone(),
                source: source.to_vec(),
                committed: false,
                records: vec![],
            },
        );
        Ok(dataset)
    }

    async fn source(&self, id: DatasetId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.lock()?.entries.get(&id).map(|e| e.source.clone()))
    }

    async fn commit(
        &self,
        id: DatasetId,
        records: &[MeasurementRecord],
        policy: RetentionPolicy,
    ) -> StoreResult<Vec<DatasetId>> {
        let mut inner = self.lock()?;

        if !inner.entries.get(&id).is_some_and(|e| !e.committed) {
            return Err(StoreError::NotPending(id));
        }

        let slots: Vec<RetentionSlot> = inner
            .entries
            .values()
            .filter(|e| e.committed)
            .map(|e| RetentionSlot { id: e.dataset.id, created_at: e.dataset.created_at })
            .collect();
        let evicted = policy.admit(&slots);

        // Nothing below can fail; the guard is held throughout.
        for old in &evicted {
            inner.entries.remove(old);
        }
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.records = records.to_vec();
            entry.committed = true;
        }
        Ok(evicted)
    }

    async fn discard(&self, id: DatasetId) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if inner.entries.get(&id).is_some_and(|e| !e.committed) {
            inner.entries.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn dataset(&self, id: DatasetId) -> StoreResult<Option<Dataset>> {
        Ok(self.lock()?.committed(id).map(|e| e.dataset.clone()))
    }

    async fn records(&self, id: DatasetId, limit: Option<usize>) -> StoreResult<Vec<MeasurementRecord>> {
        let inner = self.lock()?;
        let Some(entry) = inner.committed(id) else {
            return Ok(vec![]);
        };
        let take = limit.unwrap_or(usize::MAX);
        Ok(entry.records.iter().take(take).cloned().collect())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Dataset>> {
        let inner = self.lock()?;
        let mut out: Vec<Dataset> = inner
            .entries
            .values()
            .filter(|e| e.committed)
            .map(|e| e.dataset.clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }

    async fn purge_pending(&self) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.committed);
        Ok((before - inner.entries.len()) as u64)
    }
}
