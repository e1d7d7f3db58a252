//! Test: build from SQLite, then query text through the same store
//!
//! Exercises the full build pipeline (count, scan, embed, add, persist)
//! and the hydration path against real SQL rows.

use std::sync::Arc;

use corpus_index::vector::read_header;
use corpus_index::{
    CorpusError, EmbeddingError, IndexBuilder, IndexError, KeyError, Resolver, Retriever,
    Settings, TableKind,
};
use tempfile::TempDir;

use crate::common::{KeywordEmbedder, fixture_sqlite_store};

const DIM: usize = 64;

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.embedding.dimension = DIM;
    settings.embedding.batch_size = 2;
    settings.indexing.batch_size = 2;
    settings
}

#[tokio::test]
async fn test_build_then_query_text() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("vector_store").join("corpus.idx");
    let settings = settings();

    let store = fixture_sqlite_store().await;
    let embedder = Arc::new(KeywordEmbedder::new(DIM));

    let stats = IndexBuilder::new(store.clone(), embedder.clone(), &settings)
        .expect("builder")
        .build(&path)
        .await
        .expect("build");
    assert_eq!(stats.reviews, 3);
    assert_eq!(stats.medical_records, 2);
    assert_eq!(read_header(&path).expect("header").count, 5);

    let resolver = Arc::new(Resolver::new(store, settings.partition().expect("partition")));
    resolver.load_index(&path).expect("load index");
    let retriever = Retriever::new(resolver, embedder);

    let matches = retriever
        .query_text("persistent cough and fever", 1, None)
        .await
        .expect("query");
    assert_eq!(matches.len(), 1);
    let top = &matches[0];
    assert_eq!(top.key.to_string(), "P1");
    assert_eq!(top.table, TableKind::MedicalRecord);
    assert!(top.distance.get() < 1e-5);
    assert_eq!(top.payload["age"], 52);
    assert_eq!(top.payload["symptoms"], "persistent cough and fever");
}

#[tokio::test]
async fn test_filtered_query_keeps_only_requested_corpus() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("corpus.idx");
    let settings = settings();

    let store = fixture_sqlite_store().await;
    let embedder = Arc::new(KeywordEmbedder::new(DIM));
    IndexBuilder::new(store.clone(), embedder.clone(), &settings)
        .expect("builder")
        .with_page_size(1)
        .build(&path)
        .await
        .expect("build");

    let resolver = Arc::new(Resolver::new(store, settings.partition().expect("partition")));
    resolver.load_index(&path).expect("load index");
    let retriever = Retriever::new(resolver, embedder);

    let matches = retriever
        .query_text("package arrived damaged", 5, Some(TableKind::CustomerReview))
        .await
        .expect("query");
    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].key.to_string(), "R700002");
    assert!(matches.iter().all(|m| m.table == TableKind::CustomerReview));
    assert_eq!(matches[0].payload["rating"], 4.0);
}

#[tokio::test]
async fn test_builder_rejects_embedder_of_wrong_width() {
    let store = fixture_sqlite_store().await;
    let embedder = Arc::new(KeywordEmbedder::new(DIM / 2));

    let result = IndexBuilder::new(store, embedder, &settings());
    assert!(matches!(
        result,
        Err(CorpusError::Embedding(EmbeddingError::DimensionMismatch {
            expected: DIM,
            actual: 32
        }))
    ));
}

#[tokio::test]
async fn test_review_row_keyed_like_a_patient_fails_the_build() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("corpus.idx");

    let store = fixture_sqlite_store().await;
    // Same numeral as an existing patient; it must not alias P1's row
    sqlx::query(
        "INSERT INTO customer_reviews (review_id, review_text_cleaned) VALUES ('P1', 'late shipping')",
    )
    .execute(store.pool())
    .await
    .expect("insert mistagged review");

    let embedder = Arc::new(KeywordEmbedder::new(DIM));
    let err = IndexBuilder::new(store, embedder, &settings())
        .expect("builder")
        .build(&path)
        .await
        .expect_err("mistagged key must fail the build");

    assert!(matches!(
        err,
        CorpusError::Index(IndexError::MalformedKey {
            source: KeyError::WrongTable {
                table: TableKind::CustomerReview,
                ..
            },
            ..
        })
    ));
    assert!(!path.exists());
}
