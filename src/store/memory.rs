//! In-memory [`RecordStore`] for tests and demos.
//!
//! Rows are plain [`Payload`]s held in ordered maps, so scans page in key
//! order just like the SQL implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Payload, RecordStore, SourceText, medical_text};
use crate::error::StoreResult;
use crate::types::{EntityKey, TableKind};

/// Thread-safe in-memory store keyed by raw primary key.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    reviews: RwLock<BTreeMap<String, Payload>>,
    medical: RwLock<BTreeMap<String, Payload>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: TableKind) -> &RwLock<BTreeMap<String, Payload>> {
        match kind {
            TableKind::CustomerReview => &self.reviews,
            TableKind::MedicalRecord => &self.medical,
        }
    }

    /// Inserts or replaces a row. The primary key column is filled in from `raw_key`.
    pub fn insert(&self, kind: TableKind, raw_key: impl Into<String>, mut payload: Payload) {
        let raw_key = raw_key.into();
        payload.insert(kind.key_column().to_string(), Value::from(raw_key.clone()));
        self.table(kind).write().insert(raw_key, payload);
    }

    /// Inserts a review row with only its cleaned text.
    pub fn insert_review(&self, raw_key: impl Into<String>, text: &str) {
        let mut payload = Payload::new();
        payload.insert("review_text_cleaned".to_string(), Value::from(text));
        self.insert(TableKind::CustomerReview, raw_key, payload);
    }

    /// Inserts a medical row with only its cleaned symptoms and notes.
    pub fn insert_medical(
        &self,
        raw_key: impl Into<String>,
        symptoms: Option<&str>,
        doctor_notes: Option<&str>,
    ) {
        let mut payload = Payload::new();
        payload.insert("symptoms_cleaned".to_string(), Value::from(symptoms));
        payload.insert("doctor_notes_cleaned".to_string(), Value::from(doctor_notes));
        self.insert(TableKind::MedicalRecord, raw_key, payload);
    }

    /// Removes a row, returning whether it existed.
    pub fn remove(&self, key: &EntityKey) -> bool {
        self.table(key.kind())
            .write()
            .remove(&key.to_string())
            .is_some()
    }
}

fn text_field<'a>(payload: &'a Payload, column: &str) -> Option<&'a str> {
    payload.get(column).and_then(Value::as_str)
}

/// Indexable text for a row, mirroring the SQL scan filters.
fn indexable_text(kind: TableKind, payload: &Payload) -> Option<String> {
    match kind {
        TableKind::CustomerReview => {
            text_field(payload, "review_text_cleaned").map(str::to_string)
        }
        TableKind::MedicalRecord => {
            let symptoms = text_field(payload, "symptoms_cleaned");
            let notes = text_field(payload, "doctor_notes_cleaned");
            if symptoms.is_none() && notes.is_none() {
                return None;
            }
            Some(medical_text(symptoms, notes).unwrap_or_default())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn count_texts(&self, kind: TableKind) -> StoreResult<u64> {
        let table = self.table(kind).read();
        Ok(table
            .values()
            .filter(|row| indexable_text(kind, row).is_some())
            .count() as u64)
    }

    async fn scan_texts(
        &self,
        kind: TableKind,
        limit: u64,
        offset: u64,
    ) -> StoreResult<Vec<SourceText>> {
        let table = self.table(kind).read();
        Ok(table
            .iter()
            .filter_map(|(raw_key, row)| {
                indexable_text(kind, row).map(|text| SourceText {
                    raw_key: raw_key.clone(),
                    text,
                })
            })
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn fetch_rows(&self, keys: &[EntityKey]) -> StoreResult<Vec<Option<Payload>>> {
        Ok(keys
            .iter()
            .map(|key| {
                self.table(key.kind())
                    .read()
                    .get(&key.to_string())
                    .cloned()
            })
            .collect())
    }
}
