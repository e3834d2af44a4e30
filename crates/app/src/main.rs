use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use medibot_core::{
    build_embedder, run_ask_loop, run_chat_loop, run_ingestion, select_generator, ChatSession,
    Embedder, EmbeddingConfig, EmbeddingProvider, IngestionOptions, KeywordAnswerer, LlmConfig,
    LlmProvider, LopdfExtractor, PromptTemplate, Retriever, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_TOP_K,
};
use std::future::Future;
use std::path::PathBuf;
use tokio::io::{stdin, stdout, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "medibot", version, about = "Ask questions about a folder of PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder holding the source PDFs
    #[arg(long, env = "MEDIBOT_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Directory of the persisted vector index
    #[arg(long, env = "MEDIBOT_INDEX_DIR", default_value = "vectorstore/db_faiss", global = true)]
    index_dir: PathBuf,

    /// Number of chunks retrieved per question
    #[arg(long, env = "MEDIBOT_TOP_K", default_value_t = DEFAULT_TOP_K, global = true)]
    top_k: usize,

    /// Embedding backend: ngram, ollama or openai
    #[arg(long, env = "MEDIBOT_EMBEDDING_PROVIDER", default_value = "ngram", global = true)]
    embedding_provider: EmbeddingProviderArg,

    /// Base URL of the embedding endpoint
    #[arg(long, env = "MEDIBOT_EMBEDDING_URL", default_value = "http://localhost:11434", global = true)]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "MEDIBOT_EMBEDDING_MODEL", default_value = "all-minilm", global = true)]
    embedding_model: String,

    /// Embedding vector width
    #[arg(long, env = "MEDIBOT_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS, global = true)]
    embedding_dimensions: usize,

    /// API key for an OpenAI-compatible embedding endpoint
    #[arg(long, env = "MEDIBOT_EMBEDDING_API_KEY", global = true, hide_env_values = true)]
    embedding_api_key: Option<String>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum EmbeddingProviderArg {
    Ngram,
    Ollama,
    Openai,
}

impl From<EmbeddingProviderArg> for EmbeddingProvider {
    fn from(value: EmbeddingProviderArg) -> Self {
        match value {
            EmbeddingProviderArg::Ngram => EmbeddingProvider::Ngram,
            EmbeddingProviderArg::Ollama => EmbeddingProvider::Ollama,
            EmbeddingProviderArg::Openai => EmbeddingProvider::OpenAi,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum LlmProviderArg {
    Ollama,
    Openai,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and embed every PDF in the data folder and persist the index.
    Ingest {
        /// Characters per chunk
        #[arg(long, env = "MEDIBOT_CHUNK_SIZE", default_value_t = 500)]
        chunk_size: usize,
        /// Characters shared by neighbouring chunks
        #[arg(long, env = "MEDIBOT_CHUNK_OVERLAP", default_value_t = 50)]
        chunk_overlap: usize,
    },
    /// Interactive questions answered with the best keyword-overlap chunk.
    Ask,
    /// Chat transcript answered by a language model, or by quoting chunks.
    Chat {
        /// Language model backend; without it answers quote retrieved chunks
        #[arg(long, env = "MEDIBOT_LLM_PROVIDER")]
        llm_provider: Option<LlmProviderArg>,
        /// Base URL of the language model endpoint
        #[arg(long, env = "MEDIBOT_LLM_URL")]
        llm_url: Option<String>,
        /// Language model name
        #[arg(long, env = "MEDIBOT_LLM_MODEL", default_value = "llama3.2")]
        llm_model: String,
        /// API key for an OpenAI-compatible endpoint
        #[arg(long, env = "MEDIBOT_LLM_API_KEY", hide_env_values = true)]
        llm_api_key: Option<String>,
        /// Sampling temperature
        #[arg(long, env = "MEDIBOT_TEMPERATURE", default_value_t = 0.5)]
        temperature: f32,
        /// Maximum tokens generated per answer
        #[arg(long, env = "MEDIBOT_MAX_TOKENS", default_value_t = 256)]
        max_tokens: u32,
    },
}

impl Cli {
    fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: self.embedding_provider.into(),
            base_url: self.embedding_url.clone(),
            model: self.embedding_model.clone(),
            api_key: self.embedding_api_key.clone(),
            dimensions: self.embedding_dimensions,
        }
    }

    fn embedder(&self) -> anyhow::Result<Box<dyn Embedder>> {
        build_embedder(&self.embedding_config()).context("embedding model could not be initialized")
    }

    fn open_retriever(&self) -> anyhow::Result<Retriever> {
        Ok(Retriever::open(&self.index_dir, self.embedder()?)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "medibot boot"
    );

    match &cli.command {
        Command::Ingest {
            chunk_size,
            chunk_overlap,
        } => {
            let options = IngestionOptions {
                chunk_size: *chunk_size,
                chunk_overlap: *chunk_overlap,
            };
            let embedder = cli.embedder()?;
            let summary = run_ingestion(
                &LopdfExtractor,
                &cli.data_dir,
                &cli.index_dir,
                &options,
                embedder.as_ref(),
            )
            .await
            .with_context(|| format!("ingestion of {} failed", cli.data_dir.display()))?;

            if summary.used_sample {
                println!(
                    "No PDF files found in {}; ingested a generated sample.txt instead.",
                    cli.data_dir.display()
                );
            }
            for skipped in &summary.skipped_files {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!(
                "{} pages -> {} chunks stored in {} at {}",
                summary.document_count,
                summary.chunk_count,
                summary.index_dir.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask => {
            println!("Simple Document Q&A System");
            println!("{}", "=".repeat(40));

            let retriever = match cli.open_retriever() {
                Ok(retriever) => retriever,
                Err(error) => {
                    println!("Error loading vector store: {error:#}");
                    println!("Please make sure you have run `medibot ingest` first.");
                    return Err(error.context("failed to load vector store"));
                }
            };
            info!(
                chunk_count = retriever.index().len(),
                built_at = %retriever.index().created_at().to_rfc3339(),
                "vector store loaded"
            );

            let answerer = KeywordAnswerer::new()?;
            let mut output = stdout();
            let input = BufReader::new(stdin());
            until_interrupted(run_ask_loop(&answerer, &retriever, cli.top_k, input, &mut output)).await?;
        }
        Command::Chat {
            llm_provider,
            llm_url,
            llm_model,
            llm_api_key,
            temperature,
            max_tokens,
        } => {
            println!("HealthConnect AI Assistant");
            println!("Ask me about diseases, prevention, or vaccinations\n");

            let retriever = match cli.open_retriever() {
                Ok(retriever) => retriever,
                Err(error) => {
                    println!("Failed to load the vector store: {error:#}");
                    return Err(error.context("failed to load the vector store"));
                }
            };

            let llm_config = llm_provider.map(|provider| {
                let mut config = match provider {
                    LlmProviderArg::Ollama => LlmConfig::ollama(llm_model.clone()),
                    LlmProviderArg::Openai => LlmConfig::openai(llm_model.clone(), llm_api_key.clone()),
                };
                if let Some(url) = llm_url {
                    config.base_url = url.clone();
                }
                config.temperature = *temperature;
                config.max_tokens = *max_tokens;
                config
            });
            if llm_config.as_ref().is_some_and(|config| config.provider == LlmProvider::OpenAi && config.api_key.is_none()) {
                warn!("openai provider selected without an api key");
            }

            info!(
                chunk_count = retriever.index().len(),
                built_at = %retriever.index().created_at().to_rfc3339(),
                "vector store loaded"
            );

            let generator = select_generator(llm_config.as_ref(), PromptTemplate::default()).await;
            let mut session = ChatSession::new(retriever, generator, cli.top_k);
            info!(generator = session.generator_name(), "chat session ready");

            let mut output = stdout();
            let input = BufReader::new(stdin());
            until_interrupted(run_chat_loop(&mut session, input, &mut output)).await?;
            info!(
                answers = session.assistant_messages().count(),
                "chat session ended"
            );
        }
    }

    Ok(())
}

/// Drives `session` to completion unless Ctrl-C arrives first.
async fn until_interrupted<F>(session: F) -> anyhow::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        result = session => result.context("terminal i/o failed"),
        _ = tokio::signal::ctrl_c() => {
            println!("\nGoodbye!");
            // A pending stdin read would keep the runtime from shutting down.
            std::process::exit(0);
        }
    }
}
