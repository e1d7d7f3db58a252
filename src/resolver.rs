//! Query-time resolution of index hits into typed, hydrated records.
//!
//! A [`Resolver`] starts out unloaded. [`Resolver::load_index`] reads an
//! artifact into an immutable [`IndexSnapshot`] and installs it with a
//! single pointer swap. Every search clones the current `Arc` at call start
//! and runs against that snapshot to completion, so a concurrent reload
//! never affects a query already in flight.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{CorpusResult, IndexError, IndexResult, StoreResult};
use crate::store::{Payload, RecordStore};
use crate::types::{Distance, EntityKey, IndexKey, KeyPartition, TableKind, VectorDimension};
use crate::vector::{IdMappedIndex, SearchHit, read_artifact};

/// One resolved search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedMatch {
    pub key: EntityKey,
    pub distance: Distance,
    pub table: TableKind,
    pub payload: Payload,
}

/// A hydrated row paired with its key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydratedRecord {
    pub key: EntityKey,
    pub payload: Payload,
}

/// Lifecycle of a [`Resolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// No index yet; only `load_index` is allowed.
    Unloaded,
    /// An index is installed and queries are served.
    Ready,
}

/// Immutable, loaded index.
#[derive(Debug)]
pub struct IndexSnapshot {
    index: IdMappedIndex,
    source: PathBuf,
    generation: u64,
}

impl IndexSnapshot {
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.index.dimension()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Artifact this snapshot was read from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Increases by one with every successful load on the owning resolver.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Up to `k` nearest keys, ascending by distance.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<SearchHit>> {
        self.index.search(query, k)
    }
}

/// Resolves query vectors to typed records.
pub struct Resolver {
    store: Arc<dyn RecordStore>,
    partition: KeyPartition,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    // Serializes loads so at most one swap is in flight.
    load_lock: Mutex<()>,
    generations: AtomicU64,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("partition", &self.partition)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Creates an unloaded resolver hydrating from `store`.
    pub fn new(store: Arc<dyn RecordStore>, partition: KeyPartition) -> Self {
        Self {
            store,
            partition,
            current: RwLock::new(None),
            load_lock: Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn partition(&self) -> KeyPartition {
        self.partition
    }

    #[must_use]
    pub fn state(&self) -> ResolverState {
        if self.current.read().is_some() {
            ResolverState::Ready
        } else {
            ResolverState::Unloaded
        }
    }

    /// Reads the artifact at `path` and installs it as the current snapshot.
    ///
    /// On failure the previous snapshot, if any, stays installed.
    pub fn load_index(&self, path: &Path) -> IndexResult<Arc<IndexSnapshot>> {
        let _loading = self.load_lock.lock();

        let index = read_artifact(path)?;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = Arc::new(IndexSnapshot {
            index,
            source: path.to_path_buf(),
            generation,
        });

        let previous = self.current.write().replace(Arc::clone(&snapshot));
        tracing::info!(
            path = %path.display(),
            vectors = snapshot.len(),
            dimension = snapshot.dimension().get(),
            generation,
            replaced = previous.is_some(),
            "index loaded"
        );
        Ok(snapshot)
    }

    /// The snapshot a query starting now would use.
    pub fn snapshot(&self) -> IndexResult<Arc<IndexSnapshot>> {
        self.current.read().clone().ok_or(IndexError::NotLoaded)
    }

    /// Up to `k` `(IndexKey, distance)` hits against the current snapshot.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<SearchHit>> {
        self.snapshot()?.search(query, k)
    }

    /// Recovers the typed key from the index key's range.
    #[must_use]
    pub fn decode_key(&self, key: IndexKey) -> EntityKey {
        self.partition.decode(key)
    }

    /// Fetches the row for every key, in order.
    ///
    /// Keys with no row are logged and dropped rather than reported as errors.
    pub async fn hydrate(&self, keys: &[EntityKey]) -> StoreResult<Vec<HydratedRecord>> {
        let rows = self.store.fetch_rows(keys).await?;
        Ok(keys
            .iter()
            .zip(rows)
            .filter_map(|(key, row)| match row {
                Some(payload) => Some(HydratedRecord { key: *key, payload }),
                None => {
                    log_missing(key);
                    None
                }
            })
            .collect())
    }

    /// Search, decode and hydrate, preserving ascending distance order.
    pub async fn query(&self, query: &[f32], k: usize) -> CorpusResult<Vec<RetrievedMatch>> {
        let snapshot = self.snapshot()?;
        let hits = snapshot.search(query, k)?;
        tracing::debug!(
            k,
            hits = hits.len(),
            generation = snapshot.generation(),
            "index searched"
        );

        let keys: Vec<EntityKey> = hits.iter().map(|hit| self.decode_key(hit.key)).collect();
        let mut records = self.hydrate(&keys).await?.into_iter().peekable();

        // `hydrate` keeps input order and only drops, so each record lines up
        // with the next hit carrying the same key.
        let mut matches = Vec::with_capacity(hits.len());
        for (hit, key) in hits.into_iter().zip(keys) {
            if let Some(record) = records.next_if(|record| record.key == key) {
                matches.push(RetrievedMatch {
                    key,
                    distance: hit.distance,
                    table: key.kind(),
                    payload: record.payload,
                });
            }
        }
        Ok(matches)
    }
}

fn log_missing(key: &EntityKey) {
    tracing::warn!(
        key = %key,
        table = %key.kind(),
        "indexed key has no row in the store; dropping it from results"
    );
}
