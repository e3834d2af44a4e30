use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::index::VectorIndex;
use crate::models::RetrievedChunk;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 3;

/// A loaded index paired with the embedder that produced it.
pub struct Retriever {
    index: VectorIndex,
    embedder: Box<dyn Embedder>,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: Box<dyn Embedder>) -> Result<Self, IndexError> {
        if index.model_name() != embedder.model_name() {
            return Err(IndexError::IncompatibleEmbedder(format!(
                "index was built with embedding model {} but {} is configured",
                index.model_name(),
                embedder.model_name()
            )));
        }
        if index.dimensions() != embedder.dimensions() {
            return Err(IndexError::IncompatibleEmbedder(format!(
                "index has dimension {} but the embedder produces {}",
                index.dimensions(),
                embedder.dimensions()
            )));
        }

        Ok(Self { index, embedder })
    }

    /// Loads the index under `dir`. An embedder mismatch is reported as
    /// [`IndexError::Unavailable`] for that directory.
    pub fn open(dir: &Path, embedder: Box<dyn Embedder>) -> Result<Self, IndexError> {
        let index = VectorIndex::load(dir)?;
        Self::new(index, embedder).map_err(|error| match error {
            IndexError::IncompatibleEmbedder(reason) => IndexError::unavailable(dir, reason),
            other => other,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        let hits = self.index.search(&query_vector, k)?;
        debug!(query, hit_count = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
