pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod index;
pub mod ingest;
pub mod keywords;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod repl;
pub mod retriever;
pub mod session;

pub use chunking::{normalize_whitespace, sliding_windows, split_documents, ChunkingConfig};
pub use embeddings::{
    build_embedder, CharacterNgramEmbedder, Embedder, EmbeddingConfig, EmbeddingProvider,
    HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbedError, GenerationError, IndexError, IngestError};
pub use extractor::{load_pdf_pages, load_text_file, LopdfExtractor, PageText, PdfExtractor};
pub use generator::{
    choose_generator, select_generator, AnswerGenerator, ConcatenateGenerator, PromptedGenerator,
    NO_RELEVANT_CONTENT,
};
pub use index::{build_index, VectorIndex};
pub use ingest::{
    discover_pdf_files, load_documents, run_ingestion, IngestionSummary, LoadReport, SkippedPdf,
};
pub use keywords::{KeywordAnswerer, NO_RELEVANT_INFORMATION, STOP_WORDS};
pub use llm::{build_model, LanguageModel, LlmConfig, LlmProvider, OllamaModel, OpenAiCompatibleModel};
pub use models::{Answer, ChatMessage, Chunk, Document, IngestionOptions, RetrievedChunk, Role};
pub use prompt::{PromptTemplate, DEFAULT_PROMPT_TEMPLATE};
pub use repl::{run_ask_loop, run_chat_loop};
pub use retriever::{Retriever, DEFAULT_TOP_K};
pub use session::ChatSession;
