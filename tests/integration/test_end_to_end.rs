//! Test: end-to-end resolution over the five-record fixture corpus
//!
//! Reviews R700001-R700003 and patients P1-P2 share one index; every query
//! must come back typed, hydrated and ordered by distance.

use corpus_index::{KeyPartition, Resolver, TableKind};
use tempfile::TempDir;

use crate::common::{
    fixture_memory_store, fixture_vector, write_fixture_index, write_index,
};

#[tokio::test]
async fn test_stored_vector_resolves_to_its_own_record() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let matches = resolver
        .query(&fixture_vector("R700002"), 1)
        .await
        .expect("query");

    assert_eq!(matches.len(), 1);
    let top = &matches[0];
    assert_eq!(top.key.to_string(), "R700002");
    assert_eq!(top.table, TableKind::CustomerReview);
    assert!(top.distance.get() < 1e-6, "distance was {}", top.distance.get());
    assert_eq!(top.payload["review_text_cleaned"], "package arrived damaged");
}

#[tokio::test]
async fn test_patient_vector_resolves_to_medical_record() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let matches = resolver
        .query(&fixture_vector("P1"), 1)
        .await
        .expect("query");
    assert_eq!(matches[0].key.to_string(), "P1");
    assert_eq!(matches[0].table, TableKind::MedicalRecord);
    assert_eq!(matches[0].payload["patient_id"], "P1");
}

#[tokio::test]
async fn test_k_above_population_returns_population() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let hits = resolver.search(&[0.0; 4], 50).expect("search");
    assert_eq!(hits.len(), 5);

    let matches = resolver.query(&[0.0; 4], 50).await.expect("query");
    assert_eq!(matches.len(), 5);
}

#[tokio::test]
async fn test_results_ascend_by_distance() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let matches = resolver
        .query(&[0.3, 0.2, 0.1, 0.05], 5)
        .await
        .expect("query");
    assert_eq!(matches.len(), 5);
    for pair in matches.windows(2) {
        assert!(
            pair[0].distance <= pair[1].distance,
            "{} ({}) before {} ({})",
            pair[0].key,
            pair[0].distance.get(),
            pair[1].key,
            pair[1].distance.get()
        );
    }
}

#[tokio::test]
async fn test_missing_row_shortens_results() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let store = fixture_memory_store();
    assert!(store.remove(&"R700001".parse().expect("key")));

    let resolver = Resolver::new(store, KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let matches = resolver
        .query(&fixture_vector("R700001"), 2)
        .await
        .expect("missing rows are not errors");
    assert_eq!(matches.len(), 1);
    assert_ne!(matches[0].key.to_string(), "R700001");
}

#[tokio::test]
async fn test_threshold_boundary_decodes_by_range() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_index(
        dir.path(),
        "boundary.idx",
        &[("R700000", [1.0, 0.0, 0.0, 0.0]), ("P699999", [0.0, 1.0, 0.0, 0.0])],
    );

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let hits = resolver.search(&[1.0, 0.0, 0.0, 0.0], 2).expect("search");
    let decoded: Vec<String> = hits
        .iter()
        .map(|hit| resolver.decode_key(hit.key).to_string())
        .collect();
    assert_eq!(decoded, vec!["R700000", "P699999"]);
}
