//! Vector storage and nearest-neighbour search.
//!
//! # Architecture
//! - [`FlatL2Index`]: exhaustive L2 search over contiguous `f32` storage
//! - [`IdMappedIndex`]: attaches an [`IndexKey`](crate::types::IndexKey) to every vector
//! - [`write_artifact`] / [`read_artifact`]: checksummed single-file persistence
//! - [`EmbeddingGenerator`]: text to vector, backed by fastembed in production

mod embedding;
mod engine;
mod flat;
mod storage;

#[cfg(test)]
pub use embedding::MockEmbeddingGenerator;
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, parse_embedding_model, validate_embeddings,
};
pub use engine::{IdMappedIndex, SearchHit};
pub use flat::FlatL2Index;
pub use storage::{ArtifactHeader, read_artifact, read_header, write_artifact};
