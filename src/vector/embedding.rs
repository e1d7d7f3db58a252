//! Embedding generation for corpus text and queries.
//!
//! The embedding model is an external collaborator: text in, fixed-length
//! vector out, deterministic for a fixed model. [`EmbeddingGenerator`] is the
//! seam; [`FastEmbedGenerator`] is the production implementation.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::types::VectorDimension;

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe; the resolver shares one generator
/// across concurrent queries.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate one embedding per input text, in input order.
    fn embed_many(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Dimension of every vector this generator produces.
    fn dimension(&self) -> VectorDimension;

    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;

    /// Generate a single embedding.
    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut embeddings = self.embed_many(&[text])?;
        match embeddings.len() {
            1 => Ok(embeddings.swap_remove(0)),
            n => Err(EmbeddingError::CountMismatch {
                texts: 1,
                embeddings: n,
            }),
        }
    }
}

/// Resolve a configured model name to a fastembed model.
///
/// Accepts both the fastembed variant name (`AllMiniLML6V2`) and the
/// sentence-transformers name (`all-MiniLM-L6-v2`).
pub fn parse_embedding_model(name: &str) -> EmbeddingResult<EmbeddingModel> {
    let normalized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match normalized.as_str() {
        "allminilml6v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "allminilml12v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bgesmallenv15" => Ok(EmbeddingModel::BGESmallENV15),
        "bgebaseenv15" => Ok(EmbeddingModel::BGEBaseENV15),
        "multilinguale5small" => Ok(EmbeddingModel::MultilingualE5Small),
        _ => Err(EmbeddingError::ModelInit(format!(
            "unknown embedding model '{name}'. Supported: all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small"
        ))),
    }
}

/// fastembed-backed generator.
///
/// The output dimension is probed once at construction time.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("model", &"<TextEmbedding>")
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Load `model_name`, downloading it into `cache_dir` on first use.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> EmbeddingResult<Self> {
        let model = parse_embedding_model(model_name)?;

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;
        let width = probe.first().map(Vec::len).unwrap_or_default();
        let dimension = VectorDimension::new(width)
            .map_err(|_| EmbeddingError::ModelInit("model produced empty embeddings".into()))?;

        tracing::info!(model = model_name, dimension = width, "loaded embedding model");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: model_name.to_string(),
            dimension,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn embed_many(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                EmbeddingError::Generation(
                    "embedding model lock poisoned by a panicked thread".to_string(),
                )
            })?
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;

        validate_embeddings(texts.len(), &embeddings, self.dimension)?;
        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Checks that a generator returned one vector of the right width per text.
pub fn validate_embeddings(
    texts: usize,
    embeddings: &[Vec<f32>],
    dimension: VectorDimension,
) -> EmbeddingResult<()> {
    if embeddings.len() != texts {
        return Err(EmbeddingError::CountMismatch {
            texts,
            embeddings: embeddings.len(),
        });
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension.get()) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimension.get(),
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Mock embedding generator for testing.
///
/// Produces deterministic unit vectors with a few dimensions boosted by
/// domain keywords, so related texts land near each other.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self { dimension }
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn embed_many(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let dim = self.dimension.get();
        let mut embeddings = Vec::new();

        for text in texts {
            let mut embedding = vec![0.1; dim];

            if text.contains("shipping") && dim > 1 {
                embedding[0] = 0.9;
                embedding[1] = 0.8;
            }
            if text.contains("fever") && dim > 3 {
                embedding[2] = 0.85;
                embedding[3] = 0.75;
            }
            if text.contains("cough") && dim > 5 {
                embedding[4] = 0.8;
                embedding[5] = 0.7;
            }

            let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if magnitude > 0.0 {
                for val in &mut embedding {
                    *val /= magnitude;
                }
            }

            embeddings.push(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
