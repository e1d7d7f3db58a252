//! Text query surface.
//!
//! Embeds the query text with the same model the index was built with and
//! resolves it through a [`Resolver`]. The corpus filter is applied after
//! resolution, so a filtered query may return fewer than `top_k` matches.

use std::sync::Arc;

use crate::error::{CorpusResult, EmbeddingError};
use crate::resolver::{Resolver, RetrievedMatch};
use crate::types::TableKind;
use crate::vector::EmbeddingGenerator;

/// Resolver paired with the embedding model used for queries.
pub struct Retriever {
    resolver: Arc<Resolver>,
    embedder: Arc<dyn EmbeddingGenerator>,
}

impl Retriever {
    pub fn new(resolver: Arc<Resolver>, embedder: Arc<dyn EmbeddingGenerator>) -> Self {
        Self { resolver, embedder }
    }

    /// Embeds `text` and returns up to `top_k` matches, optionally
    /// restricted to one corpus.
    pub async fn query_text(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<TableKind>,
    ) -> CorpusResult<Vec<RetrievedMatch>> {
        let query_vector = self.embed_query(text).await?;
        let mut matches = self.resolver.query(&query_vector, top_k).await?;

        if let Some(kind) = filter {
            let before = matches.len();
            matches.retain(|m| m.table == kind);
            tracing::debug!(
                table = %kind,
                kept = matches.len(),
                dropped = before - matches.len(),
                "applied corpus filter"
            );
        }

        Ok(matches)
    }

    async fn embed_query(&self, text: &str) -> CorpusResult<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();

        let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| EmbeddingError::Generation(format!("embedding task failed: {e}")))??;
        Ok(vector)
    }
}
