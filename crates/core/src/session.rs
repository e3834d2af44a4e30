use crate::error::GenerationError;
use crate::generator::AnswerGenerator;
use crate::models::{ChatMessage, Role};
use crate::retriever::Retriever;
use tracing::warn;

/// One chat conversation over a loaded index. The transcript only grows and
/// is never fed back into retrieval or generation.
pub struct ChatSession {
    retriever: Retriever,
    generator: Box<dyn AnswerGenerator>,
    top_k: usize,
    transcript: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(retriever: Retriever, generator: Box<dyn AnswerGenerator>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Runs one turn. Blank input is ignored and returns `None`; otherwise the
    /// user message and the assistant reply are appended and the reply is
    /// returned. Failures become an `Error: ...` reply instead of ending the
    /// session.
    pub async fn handle_turn(&mut self, input: &str) -> Option<&ChatMessage> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }

        self.transcript.push(ChatMessage::user(question));
        let reply = match self.respond(question).await {
            Ok(text) => ChatMessage::assistant(text),
            Err(error) => {
                warn!(%error, "chat turn failed");
                ChatMessage::assistant(format!("Error: {error}"))
            }
        };
        self.transcript.push(reply);
        self.transcript.last()
    }

    async fn respond(&self, question: &str) -> Result<String, GenerationError> {
        let chunks = self.retriever.retrieve(question, self.top_k).await?;
        self.generator.generate(question, &chunks).await
    }

    pub fn assistant_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.transcript
            .iter()
            .filter(|message| message.role == Role::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{split_documents, ChunkingConfig};
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::generator::ConcatenateGenerator;
    use crate::index::{build_index, VectorIndex};
    use crate::models::{Document, RetrievedChunk};
    use async_trait::async_trait;

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(
            &self,
            _question: &str,
            _chunks: &[RetrievedChunk],
        ) -> Result<String, GenerationError> {
            Err(GenerationError::Unavailable("model crashed".to_string()))
        }
    }

    async fn retriever() -> Retriever {
        let documents = vec![
            Document::new("Hepatitis B is prevented by vaccination.", "hepb.pdf", Some(1)),
            Document::new("Scurvy results from a lack of vitamin C.", "scurvy.pdf", Some(2)),
        ];
        let chunks = split_documents(&documents, ChunkingConfig::new(500, 50).unwrap());
        let embedder = CharacterNgramEmbedder::default();
        let index = build_index(chunks, &embedder).await.unwrap();
        Retriever::new(index, Box::new(embedder)).unwrap()
    }

    #[tokio::test]
    async fn turn_appends_user_and_assistant_messages() {
        let mut session = ChatSession::new(retriever().await, Box::new(ConcatenateGenerator), 1);

        let reply = session.handle_turn("  What prevents hepatitis B?  ").await.cloned();
        assert_eq!(
            reply,
            Some(ChatMessage::assistant("Hepatitis B is prevented by vaccination."))
        );
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[0], ChatMessage::user("What prevents hepatitis B?"));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut session = ChatSession::new(retriever().await, Box::new(ConcatenateGenerator), 3);
        assert!(session.handle_turn("   ").await.is_none());
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn empty_index_answers_with_fixed_message() {
        let embedder = CharacterNgramEmbedder::default();
        let index = VectorIndex::from_parts("char-trigram-384", 384, Vec::new(), Vec::new()).unwrap();
        let retriever = Retriever::new(index, Box::new(embedder)).unwrap();
        let mut session = ChatSession::new(retriever, Box::new(ConcatenateGenerator), 3);

        let reply = session.handle_turn("anything?").await.unwrap();
        assert_eq!(reply.content, "No relevant content found.");
    }

    #[tokio::test]
    async fn failed_turn_keeps_the_session_alive() {
        let mut session = ChatSession::new(retriever().await, Box::new(FailingGenerator), 3);

        let first = session.handle_turn("vitamin C?").await.unwrap().content.clone();
        assert!(first.starts_with("Error: "));
        assert!(first.contains("model crashed"));

        session.handle_turn("hepatitis?").await;
        assert_eq!(session.transcript().len(), 4);
        assert_eq!(session.assistant_messages().count(), 2);
    }
}
