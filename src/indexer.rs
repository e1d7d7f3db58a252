//! Offline index construction.
//!
//! [`Indexer`] owns a key-mapped index while it is being filled and writes
//! it out as one artifact. [`IndexBuilder`] drives a full build: it pages
//! through both corpora in the store, embeds each page and hands it to the
//! indexer as one batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::display::create_progress_bar;
use crate::error::{CorpusError, CorpusResult, EmbeddingError, IndexError, IndexResult};
use crate::store::{RecordStore, SourceText};
use crate::types::{IndexKey, KeyPartition, TableKind, VectorDimension};
use crate::vector::{EmbeddingGenerator, IdMappedIndex, validate_embeddings, write_artifact};

/// Mutable index under construction.
///
/// Every batch is all-or-nothing: keys and vectors are fully validated
/// before anything is inserted.
#[derive(Debug)]
pub struct Indexer {
    index: IdMappedIndex,
    partition: KeyPartition,
}

impl Indexer {
    /// Creates an empty index for vectors of `dimension`.
    ///
    /// Fails with [`IndexError::Configuration`] when `dimension` is zero.
    pub fn create(dimension: usize, partition: KeyPartition) -> IndexResult<Self> {
        let dimension = VectorDimension::new(dimension)?;
        Ok(Self {
            index: IdMappedIndex::new(dimension),
            partition,
        })
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.index.dimension()
    }

    #[must_use]
    pub fn partition(&self) -> KeyPartition {
        self.partition
    }

    /// Number of vectors inserted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn index(&self) -> &IdMappedIndex {
        &self.index
    }

    #[must_use]
    pub fn into_index(self) -> IdMappedIndex {
        self.index
    }

    /// Inserts `vectors[i]` under the key parsed from `entity_keys[i]`.
    ///
    /// Errors, with nothing inserted:
    /// - [`IndexError::BatchLengthMismatch`] when the slices differ in length
    /// - [`IndexError::MalformedKey`] for the first key that fails to parse
    ///   or falls on the wrong side of the partition
    /// - [`IndexError::DimensionMismatch`] for a vector of the wrong width
    pub fn add_batch<K, V>(&mut self, entity_keys: &[K], vectors: &[V]) -> IndexResult<()>
    where
        K: AsRef<str>,
        V: AsRef<[f32]>,
    {
        self.insert(entity_keys, vectors, None)
    }

    /// [`add_batch`](Self::add_batch) for rows scanned from one table.
    ///
    /// Every key must also carry that table's tag; a review row keyed `P5`
    /// fails the batch with [`IndexError::MalformedKey`].
    pub fn add_table_batch<K, V>(
        &mut self,
        table: TableKind,
        entity_keys: &[K],
        vectors: &[V],
    ) -> IndexResult<()>
    where
        K: AsRef<str>,
        V: AsRef<[f32]>,
    {
        self.insert(entity_keys, vectors, Some(table))
    }

    fn insert<K, V>(
        &mut self,
        entity_keys: &[K],
        vectors: &[V],
        table: Option<TableKind>,
    ) -> IndexResult<()>
    where
        K: AsRef<str>,
        V: AsRef<[f32]>,
    {
        if entity_keys.len() != vectors.len() {
            return Err(IndexError::BatchLengthMismatch {
                keys: entity_keys.len(),
                vectors: vectors.len(),
            });
        }

        let keys = entity_keys
            .iter()
            .enumerate()
            .map(|(position, raw)| {
                let raw = raw.as_ref();
                match table {
                    Some(table) => self.partition.encode_from(table, raw),
                    None => self.partition.encode_str(raw),
                }
                .map_err(|source| IndexError::MalformedKey { position, source })
            })
            .collect::<IndexResult<Vec<IndexKey>>>()?;

        self.index.add_with_ids(&keys, vectors)
    }

    /// Writes the index to `path` as a single artifact.
    ///
    /// The file is replaced atomically; a reader never observes a partial write.
    pub fn persist(&self, path: &Path) -> IndexResult<()> {
        write_artifact(&self.index, path)?;
        tracing::info!(
            path = %path.display(),
            vectors = self.index.len(),
            dimension = self.index.dimension().get(),
            "index persisted"
        );
        Ok(())
    }
}

/// Per-corpus and total counts from a completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub reviews: usize,
    pub medical_records: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
    pub elapsed: Duration,
}

impl BuildStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.reviews + self.medical_records
    }
}

/// Full build from the relational store.
///
/// Order: create index, index reviews, index medical records, persist.
pub struct IndexBuilder {
    store: Arc<dyn RecordStore>,
    embedder: Arc<dyn EmbeddingGenerator>,
    partition: KeyPartition,
    dimension: VectorDimension,
    page_size: usize,
    embed_batch_size: usize,
    show_progress: bool,
}

impl IndexBuilder {
    /// Creates a builder from validated settings.
    ///
    /// The embedder's output width must equal `embedding.dimension`.
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingGenerator>,
        settings: &Settings,
    ) -> CorpusResult<Self> {
        settings.validate()?;
        let dimension = settings.dimension()?;
        if embedder.dimension() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension.get(),
                actual: embedder.dimension().get(),
            }
            .into());
        }

        Ok(Self {
            store,
            embedder,
            partition: settings.partition()?,
            dimension,
            page_size: settings.indexing.batch_size,
            embed_batch_size: settings.embedding.batch_size,
            show_progress: false,
        })
    }

    /// Show an indicatif bar per corpus while building.
    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Overrides the store page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Runs the whole pipeline and persists the result to `index_path`.
    pub async fn build(&self, index_path: &Path) -> CorpusResult<BuildStats> {
        let started = Instant::now();
        let mut indexer = Indexer::create(self.dimension.get(), self.partition)?;
        tracing::info!(
            dimension = self.dimension.get(),
            model = self.embedder.model_name(),
            "created empty index"
        );

        let mut reviews = 0;
        let mut medical_records = 0;
        for kind in TableKind::all() {
            let indexed = self.index_corpus(&mut indexer, kind).await?;
            match kind {
                TableKind::CustomerReview => reviews = indexed,
                TableKind::MedicalRecord => medical_records = indexed,
            }
        }

        indexer.persist(index_path)?;

        Ok(BuildStats {
            reviews,
            medical_records,
            dimension: self.dimension.get(),
            index_path: index_path.to_path_buf(),
            elapsed: started.elapsed(),
        })
    }

    async fn index_corpus(&self, indexer: &mut Indexer, kind: TableKind) -> CorpusResult<usize> {
        let total = self.store.count_texts(kind).await?;
        tracing::info!(table = %kind, total, "vectorizing corpus");

        let progress = self
            .show_progress
            .then(|| create_progress_bar(total, kind.table_name()));

        let mut processed = 0usize;
        let mut offset = 0u64;
        let page_size = self.page_size as u64;

        loop {
            let page = self.store.scan_texts(kind, page_size, offset).await?;
            if page.is_empty() {
                break;
            }

            let vectors = self.embed_page(&page).await?;
            let keys: Vec<&str> = page.iter().map(|row| row.raw_key.as_str()).collect();
            indexer.add_table_batch(kind, &keys, &vectors)?;

            processed += page.len();
            offset += page.len() as u64;
            if let Some(pb) = &progress {
                pb.inc(page.len() as u64);
            }
            tracing::info!(table = %kind, "vectorized {processed}/{total}");
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!("{kind}: {processed} indexed"));
        }
        Ok(processed)
    }

    /// Embeds one store page on the blocking pool.
    async fn embed_page(&self, page: &[SourceText]) -> CorpusResult<Vec<Vec<f32>>> {
        let texts: Vec<String> = page.iter().map(|row| row.text.clone()).collect();
        let embedder = Arc::clone(&self.embedder);
        let chunk_size = self.embed_batch_size;
        let dimension = self.dimension;

        tokio::task::spawn_blocking(move || {
            let mut vectors = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(chunk_size) {
                let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
                let embedded = embedder.embed_many(&refs)?;
                validate_embeddings(refs.len(), &embedded, dimension)?;
                vectors.extend(embedded);
            }
            Ok::<_, EmbeddingError>(vectors)
        })
        .await
        .map_err(|e| EmbeddingError::Generation(format!("embedding task failed: {e}")))?
        .map_err(CorpusError::from)
    }
}
