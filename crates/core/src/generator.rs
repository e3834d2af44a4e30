use crate::error::GenerationError;
use crate::llm::{build_model, LanguageModel, LlmConfig};
use crate::models::RetrievedChunk;
use crate::prompt::{format_context, PromptTemplate};
use async_trait::async_trait;
use tracing::{info, warn};

pub const NO_RELEVANT_CONTENT: &str = "No relevant content found.";

/// Turns a question and its retrieved chunks into the text shown to the user.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String, GenerationError>;
}

pub struct PromptedGenerator {
    model: Box<dyn LanguageModel>,
    template: PromptTemplate,
}

impl PromptedGenerator {
    pub fn new(model: Box<dyn LanguageModel>, template: PromptTemplate) -> Self {
        Self { model, template }
    }
}

#[async_trait]
impl AnswerGenerator for PromptedGenerator {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn generate(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String, GenerationError> {
        let prompt = self.template.render(&format_context(chunks), question);
        let answer = self.model.generate(&prompt).await?;
        Ok(format!("{answer}\n\n{}", format_sources(chunks)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatenateGenerator;

#[async_trait]
impl AnswerGenerator for ConcatenateGenerator {
    fn name(&self) -> &str {
        "concatenate"
    }

    async fn generate(
        &self,
        _question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String, GenerationError> {
        if chunks.is_empty() {
            return Ok(NO_RELEVANT_CONTENT.to_string());
        }
        Ok(format_context(chunks))
    }
}

pub fn format_sources(chunks: &[RetrievedChunk]) -> String {
    let mut lines = vec!["Source Docs:".to_string()];
    if chunks.is_empty() {
        lines.push("(none)".to_string());
    }
    for (position, chunk) in chunks.iter().enumerate() {
        let page = chunk
            .page
            .map(|page| format!(", page {page}"))
            .unwrap_or_default();
        lines.push(format!("{}. {}{page}", position + 1, chunk.source));
    }
    lines.join("\n")
}

/// Puts `model` in service if it answers its probe, otherwise falls back to
/// verbatim concatenation.
pub async fn choose_generator(
    model: Option<Box<dyn LanguageModel>>,
    template: PromptTemplate,
) -> Box<dyn AnswerGenerator> {
    let Some(model) = model else {
        info!("no language model configured; answers will quote retrieved chunks");
        return Box::new(ConcatenateGenerator);
    };

    match model.probe().await {
        Ok(()) => {
            info!(model = model.name(), "language model ready");
            Box::new(PromptedGenerator::new(model, template))
        }
        Err(error) => {
            warn!(model = model.name(), %error, "language model unavailable; falling back to retrieved text");
            Box::new(ConcatenateGenerator)
        }
    }
}

pub async fn select_generator(
    config: Option<&LlmConfig>,
    template: PromptTemplate,
) -> Box<dyn AnswerGenerator> {
    let model = match config.map(build_model).transpose() {
        Ok(model) => model,
        Err(error) => {
            warn!(%error, "language model could not be constructed");
            None
        }
    };
    choose_generator(model, template).await
}
