//! Relational store collaborator.
//!
//! The [`RecordStore`] trait covers the two access paths the index needs:
//! a paginated scan of cleaned text for the build, and primary-key lookup
//! for hydrating search hits. Implementations must be `Send + Sync` so a
//! single store can serve concurrent queries.

mod memory;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::{SqliteRecordStore, connect};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreResult;
use crate::types::{EntityKey, TableKind};

/// A hydrated row: column name to value.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// One row of indexable text as it comes out of a scan.
///
/// `raw_key` is the primary key exactly as stored (e.g. `R700002`); it is
/// parsed by the indexer so a malformed key fails its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceText {
    pub raw_key: String,
    pub text: String,
}

/// Storage backend holding the two source corpora.
///
/// # Operations
///
/// - [`count_texts`](RecordStore::count_texts): rows that carry indexable text
/// - [`scan_texts`](RecordStore::scan_texts): one page of those rows, ordered by key
/// - [`fetch_rows`](RecordStore::fetch_rows): point lookups inside one scoped session
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Number of rows of `kind` with non-null cleaned text.
    async fn count_texts(&self, kind: TableKind) -> StoreResult<u64>;

    /// Rows of `kind` with non-null cleaned text, ordered by primary key.
    async fn scan_texts(
        &self,
        kind: TableKind,
        limit: u64,
        offset: u64,
    ) -> StoreResult<Vec<SourceText>>;

    /// Looks up every key in one session, returning `None` for missing rows.
    ///
    /// The result has one slot per input key, in input order.
    async fn fetch_rows(&self, keys: &[EntityKey]) -> StoreResult<Vec<Option<Payload>>>;

    /// Looks up a single key.
    async fn fetch_row(&self, key: &EntityKey) -> StoreResult<Option<Payload>> {
        let mut rows = self.fetch_rows(std::slice::from_ref(key)).await?;
        Ok(rows.pop().flatten())
    }
}

/// Text indexed for a medical record: the non-empty parts joined by a space.
///
/// Returns `None` when both parts are missing or blank.
#[must_use]
pub fn medical_text(symptoms: Option<&str>, doctor_notes: Option<&str>) -> Option<String> {
    let joined = [symptoms, doctor_notes]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
