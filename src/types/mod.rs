//! Core value types shared by the indexer and the resolver.

mod dimension;
mod keys;

pub use dimension::{Distance, VECTOR_DIMENSION_384, VectorDimension};
pub use keys::{DEFAULT_REVIEW_THRESHOLD, EntityKey, IndexKey, KeyError, KeyPartition, TableKind};
