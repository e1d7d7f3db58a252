//! Exhaustive L2 index over contiguous vectors.
//!
//! `FlatL2Index` only knows vectors by their insertion position. Attaching
//! external keys is the job of [`IdMappedIndex`](crate::vector::IdMappedIndex).

use rayon::prelude::*;

use crate::error::IndexResult;
use crate::types::{Distance, VectorDimension};

/// Minimum population before distance computation is spread across threads.
const PARALLEL_SCAN_THRESHOLD: usize = 4_096;

/// Flat (brute-force) nearest neighbour index using L2 distance.
///
/// Vectors are stored back to back in one `Vec<f32>`; position `i`
/// occupies `data[i * dim..(i + 1) * dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: VectorDimension,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// Creates an empty index for vectors of `dimension`.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuilds an index from contiguous vector data.
    pub(crate) fn from_raw(dimension: VectorDimension, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len() % dimension.get(), 0);
        Self { dimension, data }
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends vectors in order.
    ///
    /// Every vector is validated before any is stored, so a failing call
    /// leaves the index untouched.
    pub fn add<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> IndexResult<()> {
        for vector in vectors {
            self.dimension.validate_vector(vector.as_ref())?;
        }

        self.data.reserve(vectors.len() * self.dimension.get());
        for vector in vectors {
            self.data.extend_from_slice(vector.as_ref());
        }
        Ok(())
    }

    /// The vector stored at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let dim = self.dimension.get();
        self.data.get(position * dim..(position + 1) * dim)
    }

    /// Raw contiguous storage, used when writing the artifact.
    pub(crate) fn as_raw(&self) -> &[f32] {
        &self.data
    }

    /// Returns up to `k` `(position, distance)` pairs, closest first.
    ///
    /// Equal distances are ordered by insertion position. The caller is
    /// responsible for validating `query` against the index dimension.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, Distance)> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let dim = self.dimension.get();
        let mut scored: Vec<(usize, Distance)> = if self.len() >= PARALLEL_SCAN_THRESHOLD {
            self.data
                .par_chunks_exact(dim)
                .enumerate()
                .map(|(pos, vector)| (pos, Distance::l2(query, vector)))
                .collect()
        } else {
            self.data
                .chunks_exact(dim)
                .enumerate()
                .map(|(pos, vector)| (pos, Distance::l2(query, vector)))
                .collect()
        };

        let by_distance = |a: &(usize, Distance), b: &(usize, Distance)| {
            a.1.cmp(&b.1).then(a.0.cmp(&b.0))
        };

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance);
        scored
    }
}
