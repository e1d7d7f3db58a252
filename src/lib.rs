//! Unified vector index over customer reviews and medical records.
//!
//! Both corpora share one integer key space split by a fixed threshold.
//! The [`Indexer`] builds and persists the index; the [`Resolver`] loads it,
//! searches it and turns raw hits back into typed, hydrated records.

pub mod config;
pub mod display;
pub mod error;
pub mod exit_code;
pub mod indexer;
pub mod logging;
pub mod resolver;
pub mod retriever;
pub mod store;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{
    CorpusError, CorpusResult, EmbeddingError, EmbeddingResult, IndexError, IndexResult,
    StoreError, StoreResult,
};
pub use exit_code::ExitCode;
pub use indexer::{BuildStats, IndexBuilder, Indexer};
pub use resolver::{HydratedRecord, IndexSnapshot, Resolver, ResolverState, RetrievedMatch};
pub use retriever::Retriever;
pub use store::{MemoryRecordStore, Payload, RecordStore, SourceText, SqliteRecordStore};
pub use types::{
    Distance, EntityKey, IndexKey, KeyError, KeyPartition, TableKind, VectorDimension,
};
pub use vector::{EmbeddingGenerator, FastEmbedGenerator, IdMappedIndex, SearchHit};
