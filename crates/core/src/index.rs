use crate::embeddings::Embedder;
use crate::error::IndexError;
use crate::models::{Chunk, RetrievedChunk};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

pub const INDEX_FILE: &str = "index.json";
pub const METADATA_FILE: &str = "metadata.json";

const FORMAT_VERSION: u32 = 1;
const EMBED_BATCH_SIZE: usize = 64;

#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    format_version: u32,
    model_name: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
}

/// Flat cosine-similarity index over chunk embeddings.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model_name: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn from_parts(
        model_name: impl Into<String>,
        dimensions: usize,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::CountMismatch {
                chunks: chunks.len(),
                embeddings: vectors.len(),
            });
        }
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: dimensions,
                actual: vector.len(),
            });
        }

        Ok(Self {
            model_name: model_name.into(),
            dimensions,
            created_at: Utc::now(),
            chunks,
            vectors,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Returns up to `k` chunks ordered by descending cosine similarity.
    /// Equal scores keep insertion order.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, IndexError> {
        if query_vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (cosine_similarity(query_vector, vector), position))
            .collect();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, position)| {
                let mut hit = RetrievedChunk::from(&self.chunks[position]);
                hit.score = Some(score);
                hit
            })
            .collect())
    }

    /// Writes the index into `dir`, replacing any index already there. Each
    /// file is written to a temporary sibling first and renamed into place.
    pub fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir)?;

        let metadata_path = dir.join(METADATA_FILE);
        if metadata_path.exists() {
            warn!(path = %dir.display(), "overwriting existing vector index");
        }

        let index = IndexFile {
            dimensions: self.dimensions,
            vectors: self.vectors.clone(),
        };
        let metadata = MetadataFile {
            format_version: FORMAT_VERSION,
            model_name: self.model_name.clone(),
            dimensions: self.dimensions,
            created_at: self.created_at,
            chunks: self.chunks.clone(),
        };

        write_atomically(&dir.join(INDEX_FILE), &serde_json::to_vec(&index)?)?;
        write_atomically(&metadata_path, &serde_json::to_vec_pretty(&metadata)?)?;

        info!(
            path = %dir.display(),
            chunk_count = self.chunks.len(),
            model = %self.model_name,
            "vector index persisted"
        );
        Ok(())
    }

    /// Loads a persisted index. Every failure, including a missing directory,
    /// is reported as [`IndexError::Unavailable`].
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let index_bytes = fs::read(dir.join(INDEX_FILE))
            .map_err(|error| IndexError::unavailable(dir, format!("{INDEX_FILE}: {error}")))?;
        let metadata_bytes = fs::read(dir.join(METADATA_FILE))
            .map_err(|error| IndexError::unavailable(dir, format!("{METADATA_FILE}: {error}")))?;

        let index: IndexFile = serde_json::from_slice(&index_bytes)
            .map_err(|error| IndexError::unavailable(dir, format!("{INDEX_FILE}: {error}")))?;
        let metadata: MetadataFile = serde_json::from_slice(&metadata_bytes)
            .map_err(|error| IndexError::unavailable(dir, format!("{METADATA_FILE}: {error}")))?;

        if metadata.format_version != FORMAT_VERSION {
            return Err(IndexError::unavailable(
                dir,
                format!("unsupported format version {}", metadata.format_version),
            ));
        }
        if index.dimensions != metadata.dimensions {
            return Err(IndexError::unavailable(
                dir,
                format!(
                    "index dimension {} disagrees with metadata dimension {}",
                    index.dimensions, metadata.dimensions
                ),
            ));
        }

        let mut loaded = Self::from_parts(
            metadata.model_name,
            metadata.dimensions,
            metadata.chunks,
            index.vectors,
        )
        .map_err(|error| IndexError::unavailable(dir, error))?;
        loaded.created_at = metadata.created_at;

        debug!(path = %dir.display(), chunk_count = loaded.len(), "vector index loaded");
        Ok(loaded)
    }
}

/// Embeds every chunk and assembles an in-memory index.
pub async fn build_index(
    chunks: Vec<Chunk>,
    embedder: &dyn Embedder,
) -> Result<VectorIndex, IndexError> {
    let mut vectors = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        vectors.extend(embedder.embed_batch(&texts).await?);
        debug!(embedded = vectors.len(), total = chunks.len(), "embedding chunks");
    }

    VectorIndex::from_parts(embedder.model_name(), embedder.dimensions(), chunks, vectors)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    fs::write(&staging, bytes)?;
    fs::rename(&staging, path)?;
    Ok(())
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_left = 0.0f32;
    let mut norm_right = 0.0f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        norm_left += a * a;
        norm_right += b * b;
    }

    let denominator = norm_left.sqrt() * norm_right.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}
