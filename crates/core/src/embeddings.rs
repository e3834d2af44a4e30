use crate::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

/// Width of all-MiniLM-L6-v2 vectors; the offline embedder uses the same size.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| EmbedError::BackendResponse {
            backend: self.model_name().to_string(),
            details: "no embedding returned".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Ngram,
    Ollama,
    OpenAi,
}

impl FromStr for EmbeddingProvider {
    type Err = EmbedError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ngram" => Ok(Self::Ngram),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(EmbedError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ngram,
            base_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            api_key: None,
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>, EmbedError> {
    match config.provider {
        EmbeddingProvider::Ngram => Ok(Box::new(CharacterNgramEmbedder::new(config.dimensions))),
        EmbeddingProvider::Ollama | EmbeddingProvider::OpenAi => {
            Ok(Box::new(HttpEmbedder::new(config.clone())?))
        }
    }
}

#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
    model_name: String,
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_name: format!("char-trigram-{dimensions}"),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Embedder backed by an Ollama or OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    client: Client,
    endpoint: Url,
    config: EmbeddingConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbedError> {
        let path = match config.provider {
            EmbeddingProvider::Ollama => "api/embed",
            EmbeddingProvider::OpenAi => "embeddings",
            EmbeddingProvider::Ngram => {
                return Err(EmbedError::UnsupportedProvider(
                    "ngram is not an http provider".to_string(),
                ))
            }
        };

        Ok(Self {
            client: Client::new(),
            endpoint: endpoint_url(&config.base_url, path)?,
            config,
        })
    }

    fn backend(&self) -> &'static str {
        match self.config.provider {
            EmbeddingProvider::OpenAi => "openai",
            _ => "ollama",
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(self.endpoint.clone()).json(&EmbedRequest {
            model: &self.config.model,
            input: texts,
        });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EmbedError::BackendResponse {
                backend: self.backend().to_string(),
                details: response.status().to_string(),
            });
        }

        let mut vectors = match self.config.provider {
            EmbeddingProvider::OpenAi => {
                let mut parsed: OpenAiEmbedResponse = response.json().await?;
                parsed.data.sort_by_key(|item| item.index);
                parsed.data.into_iter().map(|item| item.embedding).collect()
            }
            _ => response.json::<OllamaEmbedResponse>().await?.embeddings,
        };

        if vectors.len() != texts.len() {
            return Err(EmbedError::BackendResponse {
                backend: self.backend().to_string(),
                details: format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            });
        }

        for vector in &mut vectors {
            if vector.len() != self.config.dimensions {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.config.dimensions,
                    actual: vector.len(),
                });
            }
            l2_normalize(vector);
        }

        Ok(vectors)
    }
}

/// Joins `path` onto `base`, treating `base` as a directory even without a
/// trailing slash.
pub(crate) fn endpoint_url(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    Url::parse(&base)?.join(path)
}

pub(crate) fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}
