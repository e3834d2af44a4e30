//! Line-oriented front-ends for the `ask` and `chat` commands.
//!
//! Both loops read one line per turn and finish the turn before prompting
//! again. End of input ends the loop the same way an exit command does.

use crate::keywords::KeywordAnswerer;
use crate::models::{Answer, ChatMessage};
use crate::retriever::Retriever;
use crate::session::ChatSession;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

pub const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

const PREVIEW_CHARS: usize = 300;
const RULE_WIDTH: usize = 50;

pub fn is_exit_command(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    EXIT_COMMANDS.contains(&lowered.as_str())
}

/// First 300 characters of `text`, with `...` appended when cut.
pub fn preview(text: &str) -> String {
    let mut shortened: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        shortened.push_str("...");
    }
    shortened
}

pub fn render_answer(answer: &Answer) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = format!("\n{rule}\nANSWER:\n{}\n\n{rule}\nSOURCES:\n", answer.text);

    for (position, source) in answer.sources.iter().enumerate() {
        out.push_str(&format!("\nSource {}:\n", position + 1));
        out.push_str(&format!("Content: {}\n", preview(&source.text)));
        let mut metadata = format!("Metadata: source={}", source.source);
        if let Some(page) = source.page {
            metadata.push_str(&format!(", page={page}"));
        }
        if let Some(score) = source.score {
            metadata.push_str(&format!(", score={score:.4}"));
        }
        out.push_str(&metadata);
        out.push('\n');
    }

    out.push_str(&rule);
    out.push_str("\n\n");
    out
}

pub fn render_message(message: &ChatMessage) -> String {
    format!("[{}]\n{}\n\n", message.role, message.content)
}

pub async fn run_ask_loop<R, W>(
    answerer: &KeywordAnswerer,
    retriever: &Retriever,
    top_k: usize,
    input: R,
    output: &mut W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(b"System ready! Ask questions about your documents.\nType 'quit' or 'exit' to stop.\n\n")
        .await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"Your question: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\nGoodbye!\n").await?;
            break;
        };
        let query = line.trim();

        if is_exit_command(query) {
            output.write_all(b"Goodbye!\n").await?;
            break;
        }
        if query.is_empty() {
            output.write_all(b"Please enter a question.\n").await?;
            continue;
        }

        output.write_all(format!("Searching for: {query}\n").as_bytes()).await?;
        match answerer.answer_question(retriever, query, top_k).await {
            Ok(answer) => output.write_all(render_answer(&answer).as_bytes()).await?,
            Err(error) => {
                warn!(%error, "question failed");
                output
                    .write_all(format!("Error: {error}\nPlease try again.\n\n").as_bytes())
                    .await?;
            }
        }
    }

    output.flush().await
}

pub async fn run_chat_loop<R, W>(
    session: &mut ChatSession,
    input: R,
    output: &mut W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    for message in session.transcript() {
        output.write_all(render_message(message).as_bytes()).await?;
    }

    let mut lines = input.lines();
    loop {
        output.write_all(b"Type your health question here... > ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_exit_command(&line) {
            break;
        }

        let before = session.transcript().len();
        if session.handle_turn(&line).await.is_none() {
            continue;
        }
        for message in &session.transcript()[before..] {
            output.write_all(render_message(message).as_bytes()).await?;
        }
    }

    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{split_documents, ChunkingConfig};
    use crate::embeddings::{CharacterNgramEmbedder, Embedder};
    use crate::error::EmbedError;
    use crate::generator::ConcatenateGenerator;
    use crate::index::build_index;
    use crate::models::{Document, RetrievedChunk};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails its first call, then embeds like the default embedder.
    struct FlakyEmbedder {
        inner: CharacterNgramEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FlakyEmbedder {
        fn model_name(&self) -> &str {
            self.inner.model_name()
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(EmbedError::BackendResponse {
                    backend: "flaky".to_string(),
                    details: "connection refused".to_string(),
                });
            }
            self.inner.embed_batch(texts).await
        }
    }

    fn health_documents() -> Vec<Document> {
        vec![
            Document::new("Rabies is spread through animal bites.", "rabies.pdf", Some(1)),
            Document::new("Anemia is often caused by iron deficiency.", "anemia.pdf", Some(9)),
        ]
    }

    async fn retriever() -> Retriever {
        let chunks = split_documents(&health_documents(), ChunkingConfig::new(500, 50).unwrap());
        let embedder = CharacterNgramEmbedder::default();
        let index = build_index(chunks, &embedder).await.unwrap();
        Retriever::new(index, Box::new(embedder)).unwrap()
    }

    async fn ask(input: &str) -> String {
        let retriever = retriever().await;
        let answerer = KeywordAnswerer::new().unwrap();
        let mut output = Vec::new();
        run_ask_loop(&answerer, &retriever, 3, input.as_bytes(), &mut output)
            .await
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn exit_commands_match_in_any_case() {
        for command in ["quit", "EXIT", "Q", "  Quit  "] {
            assert!(is_exit_command(command), "{command} should exit");
        }
        assert!(!is_exit_command("quitting"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn long_content_is_previewed() {
        let long = "x".repeat(301);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(300)));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn answer_lists_sources_with_metadata() {
        let answer = Answer {
            text: "Iron supplements.".to_string(),
            sources: vec![RetrievedChunk {
                text: "Anemia is often caused by iron deficiency.".to_string(),
                source: "anemia.pdf".to_string(),
                page: Some(9),
                score: Some(0.5),
            }],
        };
        let rendered = render_answer(&answer);
        assert!(rendered.contains("ANSWER:\nIron supplements.\n"));
        assert!(rendered.contains("Source 1:\nContent: Anemia is often caused by iron deficiency.\n"));
        assert!(rendered.contains("Metadata: source=anemia.pdf, page=9, score=0.5000"));
    }

    #[tokio::test]
    async fn quit_stops_before_any_further_prompt() {
        let output = ask("QUIT\nWhat causes anemia?\n").await;
        assert!(output.ends_with("Your question: Goodbye!\n"));
        assert!(!output.contains("Searching for"));
        assert_eq!(output.matches("Your question: ").count(), 1);
    }

    #[tokio::test]
    async fn blank_input_is_reprompted() {
        let output = ask("   \nq\n").await;
        assert!(output.contains("Please enter a question.\n"));
        assert_eq!(output.matches("Your question: ").count(), 2);
    }

    #[tokio::test]
    async fn question_prints_best_matching_chunk() {
        let output = ask("What causes anemia?\nexit\n").await;
        assert!(output.contains("Searching for: What causes anemia?"));
        assert!(output.contains("ANSWER:\nAnemia is often caused by iron deficiency.\n"));
        assert!(output.contains("Source 2:"));
    }

    #[tokio::test]
    async fn failed_question_is_reported_and_the_loop_continues() {
        let chunks = split_documents(&health_documents(), ChunkingConfig::new(500, 50).unwrap());
        let index = build_index(chunks, &CharacterNgramEmbedder::default()).await.unwrap();
        let embedder = FlakyEmbedder {
            inner: CharacterNgramEmbedder::default(),
            calls: AtomicUsize::new(0),
        };
        let retriever = Retriever::new(index, Box::new(embedder)).unwrap();
        let answerer = KeywordAnswerer::new().unwrap();
        let mut output = Vec::new();

        run_ask_loop(
            &answerer,
            &retriever,
            3,
            "hello there\nWhat causes anemia?\nq\n".as_bytes(),
            &mut output,
        )
        .await
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        let failure = output.find("Error: ").unwrap();
        let retry = output.find("Please try again.\n").unwrap();
        let answer = output.find("ANSWER:\nAnemia is often caused by iron deficiency.\n").unwrap();
        assert!(failure < retry && retry < answer);
        assert!(output.contains("connection refused"));
        assert_eq!(output.matches("Your question: ").count(), 3);
        assert!(output.ends_with("Goodbye!\n"));
    }

    #[tokio::test]
    async fn end_of_input_says_goodbye() {
        let output = ask("").await;
        assert!(output.ends_with("\nGoodbye!\n"));
    }

    #[tokio::test]
    async fn chat_loop_renders_the_transcript() {
        let mut session = ChatSession::new(retriever().await, Box::new(ConcatenateGenerator), 1);
        let mut output = Vec::new();

        run_chat_loop(&mut session, "How is rabies spread?\n\nexit\nignored\n".as_bytes(), &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("[user]\nHow is rabies spread?\n\n"));
        assert!(output.contains("[assistant]\nRabies is spread through animal bites.\n\n"));
        assert_eq!(session.transcript().len(), 2);
    }
}
