//! SQLite-backed [`RecordStore`].

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{Payload, RecordStore, SourceText, medical_text};
use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};
use crate::types::{EntityKey, TableKind};

const CUSTOMER_REVIEWS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS customer_reviews (
    review_id VARCHAR(20) PRIMARY KEY,
    timestamp TIMESTAMP,
    rating REAL,
    verified_purchase BOOLEAN,
    product_id VARCHAR(20),
    category VARCHAR(100),
    price REAL,
    brand VARCHAR(100),
    review_text TEXT,
    age_group VARCHAR(10),
    location VARCHAR(100),
    purchase_history_count INTEGER,
    review_text_cleaned TEXT,
    normalized_rating REAL
)
"#;

const MEDICAL_RECORDS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS medical_records (
    patient_id VARCHAR(20) PRIMARY KEY,
    age INTEGER,
    gender VARCHAR(10),
    blood_type VARCHAR(5),
    visit_date TIMESTAMP,
    vital_signs TEXT,
    symptoms TEXT,
    doctor_notes TEXT,
    doctor_notes_cleaned TEXT,
    symptoms_cleaned TEXT
)
"#;

/// Opens a pool for the configured database.
///
/// File databases are created if missing and run in WAL mode so the build
/// can scan while queries hydrate.
pub async fn connect(config: &DatabaseConfig) -> StoreResult<SqlitePool> {
    let connection_err = |source| StoreError::Connection {
        url: config.url.clone(),
        source,
    };

    let mut options = SqliteConnectOptions::from_str(&config.url)
        .map_err(connection_err)?
        .create_if_missing(true);
    if !config.url.contains(":memory:") {
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| connection_err(sqlx::Error::Io(e)))?;
            }
        }
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(connection_err)
}

/// SQLite implementation of [`RecordStore`].
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates both source tables if they do not exist.
    pub async fn create_schema(&self) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::query("begin schema transaction"))?;

        for ddl in [CUSTOMER_REVIEWS_DDL, MEDICAL_RECORDS_DDL] {
            sqlx::query(ddl)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::query("create table"))?;
        }

        tx.commit()
            .await
            .map_err(StoreError::query("commit schema transaction"))?;
        tracing::info!("source tables ready");
        Ok(())
    }
}

fn count_sql(kind: TableKind) -> &'static str {
    match kind {
        TableKind::CustomerReview => {
            "SELECT COUNT(*) FROM customer_reviews WHERE review_text_cleaned IS NOT NULL"
        }
        TableKind::MedicalRecord => {
            "SELECT COUNT(*) FROM medical_records WHERE symptoms_cleaned IS NOT NULL OR doctor_notes_cleaned IS NOT NULL"
        }
    }
}

fn scan_sql(kind: TableKind) -> &'static str {
    match kind {
        TableKind::CustomerReview => {
            r#"
            SELECT review_id, review_text_cleaned FROM customer_reviews
            WHERE review_text_cleaned IS NOT NULL
            ORDER BY review_id
            LIMIT ? OFFSET ?
            "#
        }
        TableKind::MedicalRecord => {
            r#"
            SELECT patient_id, symptoms_cleaned, doctor_notes_cleaned FROM medical_records
            WHERE symptoms_cleaned IS NOT NULL OR doctor_notes_cleaned IS NOT NULL
            ORDER BY patient_id
            LIMIT ? OFFSET ?
            "#
        }
    }
}

fn lookup_sql(kind: TableKind) -> &'static str {
    match kind {
        TableKind::CustomerReview => "SELECT * FROM customer_reviews WHERE review_id = ?",
        TableKind::MedicalRecord => "SELECT * FROM medical_records WHERE patient_id = ?",
    }
}

fn decode_err(column: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Decode {
        column: column.to_string(),
        reason: e.to_string(),
    }
}

fn source_text(kind: TableKind, row: &SqliteRow) -> StoreResult<SourceText> {
    let key_column = kind.key_column();
    let raw_key: String = row.try_get(0).map_err(decode_err(key_column))?;

    let text = match kind {
        TableKind::CustomerReview => row
            .try_get::<Option<String>, _>(1)
            .map_err(decode_err("review_text_cleaned"))?,
        TableKind::MedicalRecord => {
            let symptoms: Option<String> =
                row.try_get(1).map_err(decode_err("symptoms_cleaned"))?;
            let notes: Option<String> =
                row.try_get(2).map_err(decode_err("doctor_notes_cleaned"))?;
            medical_text(symptoms.as_deref(), notes.as_deref())
        }
    };

    Ok(SourceText {
        raw_key,
        text: text.unwrap_or_default(),
    })
}

/// Converts every column of a row into JSON, keyed by column name.
fn row_to_payload(row: &SqliteRow) -> StoreResult<Payload> {
    let mut payload = Payload::new();

    for column in row.columns() {
        let name = column.name();
        let ordinal = column.ordinal();
        let raw = row.try_get_raw(ordinal).map_err(decode_err(name))?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage_class = raw.type_info().name().to_string();
            match storage_class.as_str() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(ordinal).map_err(decode_err(name))?),
                "REAL" => {
                    let v: f64 = row.try_get(ordinal).map_err(decode_err(name))?;
                    serde_json::Number::from_f64(v)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
                "TEXT" => Value::from(row.try_get::<String, _>(ordinal).map_err(decode_err(name))?),
                other => {
                    return Err(StoreError::Decode {
                        column: name.to_string(),
                        reason: format!("unsupported storage class {other}"),
                    });
                }
            }
        };

        payload.insert(name.to_string(), value);
    }

    Ok(payload)
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn count_texts(&self, kind: TableKind) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(count_sql(kind))
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::query("count source texts"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn scan_texts(
        &self,
        kind: TableKind,
        limit: u64,
        offset: u64,
    ) -> StoreResult<Vec<SourceText>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let rows = sqlx::query(scan_sql(kind))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::query("scan source texts"))?;

        rows.iter().map(|row| source_text(kind, row)).collect()
    }

    async fn fetch_rows(&self, keys: &[EntityKey]) -> StoreResult<Vec<Option<Payload>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        // One connection per batch; dropping the transaction on an early
        // return rolls it back and hands the connection back to the pool.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(StoreError::query("begin hydrate transaction"))?;

        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let row = sqlx::query(lookup_sql(key.kind()))
                .bind(key.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(StoreError::query("fetch row by key"))?;
            rows.push(row.as_ref().map(row_to_payload).transpose()?);
        }

        tx.commit()
            .await
            .map_err(StoreError::query("commit hydrate transaction"))?;
        Ok(rows)
    }
}
