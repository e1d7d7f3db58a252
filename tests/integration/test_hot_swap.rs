//! Test: replacing the loaded index while queries are in flight
//!
//! A query that has already taken its snapshot must finish against that
//! snapshot; queries started after the swap see the new index.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use corpus_index::{KeyPartition, Resolver, ResolverState};
use tempfile::TempDir;

use crate::common::{GatedStore, fixture_memory_store, write_index};

const PROBE: [f32; 4] = [1.0, 0.0, 0.0, 0.0];

#[tokio::test]
async fn test_in_flight_query_keeps_its_snapshot() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let old_path = write_index(dir.path(), "old.idx", &[("R700001", PROBE)]);
    let new_path = write_index(dir.path(), "new.idx", &[("P2", PROBE)]);

    let store = Arc::new(GatedStore::new(fixture_memory_store()));
    let resolver = Arc::new(Resolver::new(store.clone(), KeyPartition::default()));
    resolver.load_index(&old_path).expect("load old index");

    let in_flight = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move { resolver.query(&PROBE, 1).await })
    };

    // The query has searched the old snapshot and is now waiting on the store
    store.entered.notified().await;
    let swapped = resolver.load_index(&new_path).expect("load new index");
    assert_eq!(swapped.generation(), 2);
    store.release.notify_one();

    let matches = in_flight
        .await
        .expect("query task panicked")
        .expect("query");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].key.to_string(), "R700001");

    // Permit stored up front so the next lookup does not park
    store.release.notify_one();
    let matches = resolver.query(&PROBE, 1).await.expect("query");
    assert_eq!(matches[0].key.to_string(), "P2");
}

#[test]
fn test_searches_never_fail_during_repeated_swaps() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let first = write_index(
        dir.path(),
        "first.idx",
        &[("R700001", PROBE), ("P1", [0.0, 1.0, 0.0, 0.0])],
    );
    let second = write_index(
        dir.path(),
        "second.idx",
        &[("R700002", PROBE), ("P2", [0.0, 0.0, 1.0, 0.0])],
    );

    let resolver = Arc::new(Resolver::new(fixture_memory_store(), KeyPartition::default()));
    resolver.load_index(&first).expect("load first index");

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut searches = 0usize;
                while !done.load(Ordering::Relaxed) || searches == 0 {
                    let hits = resolver.search(&PROBE, 1).expect("search during swap");
                    let top = resolver.decode_key(hits[0].key).to_string();
                    assert!(top == "R700001" || top == "R700002", "unexpected {top}");
                    searches += 1;
                }
                searches
            })
        })
        .collect();

    for round in 0..50 {
        let path = if round % 2 == 0 { &second } else { &first };
        resolver.load_index(path).expect("swap index");
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().expect("reader panicked") > 0);
    }
    assert_eq!(resolver.state(), ResolverState::Ready);
    assert_eq!(resolver.snapshot().expect("snapshot").generation(), 51);
}
