use crate::embeddings::endpoint_url;
use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap reachability check run once before the model is put in service.
    async fn probe(&self) -> Result<(), GenerationError>;

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = GenerationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(GenerationError::Unavailable(format!(
                "unsupported language model provider: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
            api_key: None,
            temperature: 0.5,
            max_tokens: 256,
        }
    }

    pub fn openai(model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key,
            temperature: 0.5,
            max_tokens: 256,
        }
    }
}

pub fn build_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>, GenerationError> {
    match config.provider {
        LlmProvider::Ollama => Ok(Box::new(OllamaModel::new(config.clone())?)),
        LlmProvider::OpenAi => Ok(Box::new(OpenAiCompatibleModel::new(config.clone())?)),
    }
}

/// Ollama `/api/generate` backend.
pub struct OllamaModel {
    client: Client,
    base: Url,
    config: LlmConfig,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaModel {
    pub fn new(config: LlmConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            client: Client::new(),
            base: endpoint_url(&config.base_url, "")?,
            config,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn probe(&self) -> Result<(), GenerationError> {
        let response = self
            .client
            .get(self.base.join("api/tags")?)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "ollama".to_string(),
                details: response.status().to_string(),
            });
        }

        let tags: Value = response.json().await?;
        let installed = tags
            .pointer("/models")
            .and_then(Value::as_array)
            .map(|models| {
                models.iter().any(|model| {
                    model
                        .pointer("/name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| name == self.config.model || name.starts_with(&format!("{}:", self.config.model)))
                })
            })
            .unwrap_or(false);

        if !installed {
            return Err(GenerationError::Unavailable(format!(
                "model {} is not installed in ollama",
                self.config.model
            )));
        }
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.base.join("api/generate")?)
            .json(&OllamaGenerateRequest {
                model: &self.config.model,
                prompt,
                stream: false,
                options: OllamaOptions {
                    temperature: self.config.temperature,
                    num_predict: self.config.max_tokens,
                },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::BackendResponse {
                backend: "ollama".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let parsed: OllamaGenerateResponse = response.json().await?;
        Ok(parsed.response.trim().to_string())
    }
}

/// Any `/chat/completions` endpoint speaking the OpenAI wire format.
pub struct OpenAiCompatibleModel {
    client: Client,
    base: Url,
    config: LlmConfig,
}

impl OpenAiCompatibleModel {
    pub fn new(config: LlmConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            client: Client::new(),
            base: endpoint_url(&config.base_url, "")?,
            config,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn probe(&self) -> Result<(), GenerationError> {
        let response = self
            .authorized(self.client.get(self.base.join("models")?))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "openai".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .authorized(self.client.post(self.base.join("chat/completions")?))
            .json(&json!({
                "model": self.config.model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": self.config.temperature,
                "max_tokens": self.config.max_tokens,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::BackendResponse {
                backend: "openai".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| GenerationError::BackendResponse {
                backend: "openai".to_string(),
                details: "response has no choices[0].message.content".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_parse() {
        assert_eq!("OLLAMA".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert_eq!(" openai ".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert!("transformers".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn defaults_match_the_sampling_config() {
        let config = LlmConfig::ollama("llama3.2");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.base_url, "http://localhost:11434");
    }

    #[test]
    fn openai_base_keeps_version_segment() {
        let model = OpenAiCompatibleModel::new(LlmConfig::openai("gpt-4o-mini", None)).unwrap();
        assert_eq!(
            model.base.join("chat/completions").unwrap().as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut config = LlmConfig::ollama("llama3.2");
        config.base_url = "::not-a-url".to_string();
        assert!(matches!(build_model(&config), Err(GenerationError::Url(_))));
    }

    #[tokio::test]
    async fn unreachable_backend_fails_probe() {
        let mut config = LlmConfig::ollama("llama3.2");
        config.base_url = "http://127.0.0.1:9".to_string();
        let model = build_model(&config).unwrap();
        assert!(model.probe().await.is_err());
    }
}
