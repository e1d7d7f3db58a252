//! Test: batch insertion is all-or-nothing
//!
//! A failing AddBatch must leave both the in-memory population and the
//! persisted artifact exactly as they were.

use corpus_index::vector::read_header;
use corpus_index::{IndexError, Indexer, KeyError, KeyPartition};
use tempfile::TempDir;

use crate::common::{FIXTURE_DIM, fixture_records};

fn seeded_indexer() -> Indexer {
    let mut indexer = Indexer::create(FIXTURE_DIM, KeyPartition::default()).expect("create");
    let records = fixture_records();
    let keys: Vec<&str> = records.iter().map(|(k, _, _)| *k).collect();
    let vectors: Vec<Vec<f32>> = records.iter().map(|(_, _, v)| v.to_vec()).collect();
    indexer.add_batch(&keys, &vectors).expect("seed batch");
    indexer
}

#[test]
fn test_three_keys_two_vectors_fails_and_keeps_population() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("corpus.idx");

    let mut indexer = seeded_indexer();
    let before = indexer.len();

    let err = indexer
        .add_batch(
            &["R700004", "R700005", "R700006"],
            &[vec![0.1; FIXTURE_DIM], vec![0.2; FIXTURE_DIM]],
        )
        .expect_err("length mismatch must fail");
    assert!(matches!(
        err,
        IndexError::BatchLengthMismatch {
            keys: 3,
            vectors: 2
        }
    ));
    assert!(err.is_dimension_mismatch());
    assert_eq!(indexer.len(), before);

    indexer.persist(&path).expect("persist");
    assert_eq!(read_header(&path).expect("header").count, before);
}

#[test]
fn test_malformed_key_anywhere_rejects_the_batch() {
    let mut indexer = seeded_indexer();
    let before = indexer.len();

    for bad in ["Q12", "R", "R70000x", ""] {
        let err = indexer
            .add_batch(
                &["R700010", bad],
                &[vec![0.0; FIXTURE_DIM], vec![1.0; FIXTURE_DIM]],
            )
            .expect_err("malformed key must fail");
        assert!(
            matches!(err, IndexError::MalformedKey { position: 1, .. }),
            "unexpected error for {bad:?}: {err}"
        );
        assert_eq!(indexer.len(), before);
    }
}

#[test]
fn test_key_on_wrong_side_of_threshold_is_rejected() {
    let mut indexer = seeded_indexer();
    let err = indexer
        .add_batch(&["R12"], &[vec![0.0; FIXTURE_DIM]])
        .expect_err("review numeral below threshold");
    assert!(matches!(
        err,
        IndexError::MalformedKey {
            source: KeyError::PartitionViolation { .. },
            ..
        }
    ));
}

#[test]
fn test_duplicate_keys_grow_population() {
    let mut indexer = seeded_indexer();
    let before = indexer.len();

    indexer
        .add_batch(&["P1"], &[vec![0.0, 0.0, 0.9, 0.1]])
        .expect("duplicates are allowed");
    assert_eq!(indexer.len(), before + 1);

    let hits = indexer
        .index()
        .search(&[0.0, 0.0, 1.0, 0.0], 2)
        .expect("search");
    assert!(hits.iter().all(|hit| hit.key.get() == 1));
}
