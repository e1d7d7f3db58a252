//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use corpus_index::config::DatabaseConfig;
use corpus_index::error::EmbeddingResult;
use corpus_index::store::connect;
use corpus_index::{
    EmbeddingGenerator, EntityKey, Indexer, KeyPartition, MemoryRecordStore, Payload,
    RecordStore, SourceText, SqliteRecordStore, StoreResult, TableKind, VectorDimension,
};
use tokio::sync::Notify;

pub const FIXTURE_DIM: usize = 4;

/// The five-record corpus used across the end-to-end tests:
/// reviews 700001-700003 and patients 1-2, each with a fixed vector.
pub fn fixture_records() -> Vec<(&'static str, &'static str, [f32; FIXTURE_DIM])> {
    vec![
        ("R700001", "fast shipping great price", [1.0, 0.0, 0.0, 0.0]),
        ("R700002", "package arrived damaged", [0.0, 1.0, 0.0, 0.0]),
        ("R700003", "would buy again", [0.5, 0.5, 0.0, 0.0]),
        ("P1", "persistent cough and fever", [0.0, 0.0, 1.0, 0.0]),
        ("P2", "knee pain after running", [0.0, 0.0, 0.0, 1.0]),
    ]
}

/// The stored vector for `key` in [`fixture_records`].
pub fn fixture_vector(key: &str) -> Vec<f32> {
    fixture_records()
        .into_iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, _, v)| v.to_vec())
        .expect("fixture key exists")
}

/// Persists an index holding `records` and returns its path.
pub fn write_index(dir: &Path, name: &str, records: &[(&str, [f32; FIXTURE_DIM])]) -> PathBuf {
    let path = dir.join(name);
    let mut indexer =
        Indexer::create(FIXTURE_DIM, KeyPartition::default()).expect("create indexer");
    let keys: Vec<&str> = records.iter().map(|(k, _)| *k).collect();
    let vectors: Vec<Vec<f32>> = records.iter().map(|(_, v)| v.to_vec()).collect();
    indexer.add_batch(&keys, &vectors).expect("add batch");
    indexer.persist(&path).expect("persist index");
    path
}

/// Persists the full fixture corpus.
pub fn write_fixture_index(dir: &Path) -> PathBuf {
    let records: Vec<(&str, [f32; FIXTURE_DIM])> = fixture_records()
        .into_iter()
        .map(|(k, _, v)| (k, v))
        .collect();
    write_index(dir, "corpus.idx", &records)
}

/// In-memory store holding the fixture corpus.
pub fn fixture_memory_store() -> Arc<MemoryRecordStore> {
    let store = Arc::new(MemoryRecordStore::new());
    for (key, text, _) in fixture_records() {
        if key.starts_with('R') {
            store.insert_review(key, text);
        } else {
            store.insert_medical(key, Some(text), None);
        }
    }
    store
}

/// SQLite store in a single-connection in-memory database with the fixture corpus.
pub async fn fixture_sqlite_store() -> Arc<SqliteRecordStore> {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let store = SqliteRecordStore::new(connect(&config).await.expect("connect"));
    store.create_schema().await.expect("create schema");

    for (key, text, _) in fixture_records() {
        let sql = if key.starts_with('R') {
            "INSERT INTO customer_reviews (review_id, rating, review_text, review_text_cleaned) VALUES (?, 4.0, ?, ?)"
        } else {
            "INSERT INTO medical_records (patient_id, age, symptoms, symptoms_cleaned) VALUES (?, 52, ?, ?)"
        };
        sqlx::query(sql)
            .bind(key)
            .bind(text)
            .bind(text)
            .execute(store.pool())
            .await
            .expect("insert fixture row");
    }
    Arc::new(store)
}

/// Deterministic bag-of-words embedder.
///
/// Each token is hashed into one of `dimension` buckets and the result is
/// normalized, so texts sharing words land close together.
pub struct KeywordEmbedder {
    dimension: VectorDimension,
}

impl KeywordEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: VectorDimension::new(dimension).expect("non-zero dimension"),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        // FNV-1a
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.dimension.get() as u64) as usize
    }
}

impl EmbeddingGenerator for KeywordEmbedder {
    fn embed_many(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; self.dimension.get()];
                for token in text.split_whitespace() {
                    vector[self.bucket(&token.to_lowercase())] += 1.0;
                }
                let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    vector.iter_mut().for_each(|x| *x /= norm);
                }
                vector
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "keyword-hash"
    }
}

/// Store whose lookups park until released, to hold a query in flight.
pub struct GatedStore {
    inner: Arc<MemoryRecordStore>,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedStore {
    pub fn new(inner: Arc<MemoryRecordStore>) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl RecordStore for GatedStore {
    async fn count_texts(&self, kind: TableKind) -> StoreResult<u64> {
        self.inner.count_texts(kind).await
    }

    async fn scan_texts(
        &self,
        kind: TableKind,
        limit: u64,
        offset: u64,
    ) -> StoreResult<Vec<SourceText>> {
        self.inner.scan_texts(kind, limit, offset).await
    }

    async fn fetch_rows(&self, keys: &[EntityKey]) -> StoreResult<Vec<Option<Payload>>> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.fetch_rows(keys).await
    }
}
