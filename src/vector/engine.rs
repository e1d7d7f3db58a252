//! Key-mapped vector index.
//!
//! Wraps [`FlatL2Index`] so every vector carries an arbitrary,
//! externally assigned [`IndexKey`] instead of its insertion position.

use crate::error::{IndexError, IndexResult};
use crate::types::{Distance, IndexKey, VectorDimension};
use crate::vector::FlatL2Index;

/// One nearest-neighbour hit: the stored key and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub key: IndexKey,
    pub distance: Distance,
}

/// Flat L2 index with an explicit key per vector.
///
/// `keys[i]` is the key of the vector at position `i` in the flat index.
/// Keys are not deduplicated: adding the same key twice stores two entries.
#[derive(Debug, Clone, PartialEq)]
pub struct IdMappedIndex {
    flat: FlatL2Index,
    keys: Vec<IndexKey>,
}

impl IdMappedIndex {
    /// Creates an empty index for vectors of `dimension`.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            flat: FlatL2Index::new(dimension),
            keys: Vec::new(),
        }
    }

    /// Reassembles an index from its persisted parts.
    pub(crate) fn from_parts(
        dimension: VectorDimension,
        keys: Vec<IndexKey>,
        data: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(keys.len() * dimension.get(), data.len());
        Self {
            flat: FlatL2Index::from_raw(dimension, data),
            keys,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.flat.dimension()
    }

    /// Number of stored vectors, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Stored keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> &[IndexKey] {
        &self.keys
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        self.flat.as_raw()
    }

    /// First stored vector for `key`, if any.
    #[must_use]
    pub fn vector_for(&self, key: IndexKey) -> Option<&[f32]> {
        let position = self.keys.iter().position(|k| *k == key)?;
        self.flat.vector(position)
    }

    /// Inserts `vectors[i]` under `keys[i]` for every `i`.
    ///
    /// Lengths and dimensions are checked up front; on error nothing is inserted.
    pub fn add_with_ids<V: AsRef<[f32]>>(
        &mut self,
        keys: &[IndexKey],
        vectors: &[V],
    ) -> IndexResult<()> {
        if keys.len() != vectors.len() {
            return Err(IndexError::BatchLengthMismatch {
                keys: keys.len(),
                vectors: vectors.len(),
            });
        }

        self.flat.add(vectors)?;
        self.keys.extend_from_slice(keys);
        Ok(())
    }

    /// Returns up to `k` hits ordered by ascending distance.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<SearchHit>> {
        if k == 0 {
            return Err(IndexError::InvalidTopK { k });
        }
        self.dimension().validate_vector(query)?;

        Ok(self
            .flat
            .search(query, k)
            .into_iter()
            .map(|(position, distance)| SearchHit {
                key: self.keys[position],
                distance,
            })
            .collect())
    }
}
