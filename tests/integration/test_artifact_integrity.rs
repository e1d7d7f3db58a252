//! Test: damaged or missing artifacts never replace a working index

use std::fs;

use corpus_index::vector::read_header;
use corpus_index::{
    CorpusError, ExitCode, IndexError, KeyPartition, Resolver, ResolverState,
};
use tempfile::TempDir;

use crate::common::{FIXTURE_DIM, fixture_memory_store, write_fixture_index};

#[test]
fn test_header_reports_population_and_width() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let header = read_header(&path).expect("header");
    assert_eq!(header.count, 5);
    assert_eq!(header.dimension.get(), FIXTURE_DIM);
}

#[test]
fn test_corrupt_artifact_leaves_resolver_unloaded() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let mut bytes = fs::read(&path).expect("read artifact");
    let last_vector_byte = bytes.len() - 33;
    bytes[last_vector_byte] ^= 0xff;
    fs::write(&path, &bytes).expect("write corrupted artifact");

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    let err = resolver.load_index(&path).expect_err("checksum must fail");
    assert!(matches!(err, IndexError::Load { .. }));
    assert_eq!(resolver.state(), ResolverState::Unloaded);

    let err = resolver.search(&[0.0; FIXTURE_DIM], 1).expect_err("not loaded");
    assert!(matches!(err, IndexError::NotLoaded));
    assert_eq!(
        ExitCode::from_error(&CorpusError::from(err)),
        ExitCode::IndexUnavailable
    );
}

#[test]
fn test_failed_reload_keeps_previous_index() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let truncated = dir.path().join("truncated.idx");
    let bytes = fs::read(&path).expect("read artifact");
    fs::write(&truncated, &bytes[..bytes.len() / 2]).expect("write truncated artifact");

    assert!(resolver.load_index(&truncated).is_err());
    assert!(resolver.load_index(&dir.path().join("missing.idx")).is_err());

    let snapshot = resolver.snapshot().expect("previous snapshot");
    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot.source(), path.as_path());
}

#[test]
fn test_bad_queries_are_rejected_before_search() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_fixture_index(dir.path());

    let resolver = Resolver::new(fixture_memory_store(), KeyPartition::default());
    resolver.load_index(&path).expect("load index");

    let err = resolver.search(&[0.0; 3], 1).expect_err("wrong width");
    assert!(matches!(
        err,
        IndexError::DimensionMismatch {
            expected: FIXTURE_DIM,
            actual: 3
        }
    ));

    let err = resolver.search(&[0.0; FIXTURE_DIM], 0).expect_err("k = 0");
    assert!(matches!(err, IndexError::InvalidTopK { k: 0 }));
}
