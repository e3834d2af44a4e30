//! Keyword-overlap answer selection used by the `ask` loop.
//!
//! Candidates are scored by the number of distinct keywords they share with
//! the question. There is no term weighting and no length normalization.

use crate::error::IndexError;
use crate::models::{Answer, RetrievedChunk};
use crate::retriever::Retriever;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found in the documents.";

pub const STOP_WORDS: [&str; 50] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "must", "can", "this", "that", "these", "those", "i", "you",
    "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
];

const MIN_KEYWORD_CHARS: usize = 3;

pub struct KeywordAnswerer {
    word: Regex,
    stop_words: HashSet<&'static str>,
}

impl KeywordAnswerer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            word: Regex::new(r"\b\w+\b")?,
            stop_words: STOP_WORDS.into_iter().collect(),
        })
    }

    /// Lowercased word tokens of `text`, in order, minus stop words and
    /// tokens shorter than three characters. Duplicates are kept.
    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.word
            .find_iter(&lowered)
            .map(|token| token.as_str())
            .filter(|token| !self.stop_words.contains(token))
            .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
            .map(str::to_string)
            .collect()
    }

    pub fn score(&self, query_keywords: &HashSet<String>, text: &str) -> usize {
        let keywords: HashSet<String> = self.extract_keywords(text).into_iter().collect();
        query_keywords.intersection(&keywords).count()
    }

    /// Picks the candidate with the strictly highest overlap score. Ties keep
    /// the earlier candidate and an all-zero field falls back to the first.
    pub fn find_best_answer<'a>(
        &self,
        query: &str,
        candidates: &'a [RetrievedChunk],
    ) -> Option<&'a RetrievedChunk> {
        let first = candidates.first()?;
        let query_keywords: HashSet<String> = self.extract_keywords(query).into_iter().collect();

        let mut best_score = 0;
        let mut best = None;
        for candidate in candidates {
            let score = self.score(&query_keywords, &candidate.text);
            if score > best_score {
                best_score = score;
                best = Some(candidate);
            }
        }

        debug!(best_score, candidate_count = candidates.len(), "keyword overlap scored");
        Some(best.unwrap_or(first))
    }

    pub fn best_answer_text(&self, query: &str, candidates: &[RetrievedChunk]) -> String {
        self.find_best_answer(query, candidates)
            .map(|chunk| chunk.text.clone())
            .unwrap_or_else(|| NO_RELEVANT_INFORMATION.to_string())
    }

    pub async fn answer_question(
        &self,
        retriever: &Retriever,
        query: &str,
        top_k: usize,
    ) -> Result<Answer, IndexError> {
        let sources = retriever.retrieve(query, top_k).await?;
        Ok(Answer {
            text: self.best_answer_text(query, &sources),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{split_documents, ChunkingConfig};
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::index::build_index;
    use crate::models::Document;

    fn candidate(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            source: "guide.pdf".to_string(),
            page: Some(1),
            score: None,
        }
    }

    fn answerer() -> KeywordAnswerer {
        KeywordAnswerer::new().unwrap()
    }

    #[test]
    fn stop_word_list_has_no_duplicates() {
        let unique: HashSet<&str> = STOP_WORDS.into_iter().collect();
        assert_eq!(unique.len(), STOP_WORDS.len());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let answerer = answerer();
        assert_eq!(
            answerer.extract_keywords("The CAT sat"),
            answerer.extract_keywords("the cat sat")
        );
        assert_eq!(answerer.extract_keywords("The CAT sat"), vec!["cat", "sat"]);
    }

    #[test]
    fn keyword_extraction_is_idempotent() {
        let answerer = answerer();
        let once = answerer.extract_keywords("Vaccines, for CHILDREN, should be given early!");
        let twice = answerer.extract_keywords(&once.join(" "));
        assert_eq!(once, twice);
        assert_eq!(once, vec!["vaccines", "children", "given", "early"]);
    }

    #[test]
    fn stop_words_and_short_tokens_are_dropped() {
        let answerer = answerer();
        let keywords = answerer.extract_keywords("Is it OK to go to a doctor if these symptoms persist?");
        assert_eq!(keywords, vec!["doctor", "symptoms", "persist"]);
    }

    #[test]
    fn underscores_and_digits_are_word_characters() {
        let answerer = answerer();
        assert_eq!(answerer.extract_keywords("covid_19 h1n1 5mg"), vec!["covid_19", "h1n1", "5mg"]);
    }

    #[test]
    fn highest_score_wins() {
        let answerer = answerer();
        let candidates = vec![
            candidate("fever treatment"),
            candidate("fever treatment rest fluids"),
            candidate("fever fluids"),
        ];
        let query = "fever treatment with rest and fluids";
        let query_keywords: HashSet<String> = answerer.extract_keywords(query).into_iter().collect();
        let scores: Vec<usize> = candidates
            .iter()
            .map(|item| answerer.score(&query_keywords, &item.text))
            .collect();
        assert_eq!(scores, vec![2, 4, 2]);

        let best = answerer.find_best_answer(query, &candidates).unwrap();
        assert_eq!(best.text, "fever treatment rest fluids");
    }

    #[test]
    fn scores_one_three_two_pick_the_middle() {
        let answerer = answerer();
        let candidates = vec![
            candidate("malaria"),
            candidate("malaria mosquito prevention"),
            candidate("malaria mosquito"),
        ];
        let answer = answerer.best_answer_text("malaria mosquito prevention", &candidates);
        assert_eq!(answer, "malaria mosquito prevention");
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let answerer = answerer();
        let candidates = vec![
            candidate("nothing relevant"),
            candidate("measles rash"),
            candidate("rash measles"),
        ];
        assert_eq!(answerer.best_answer_text("measles rash", &candidates), "measles rash");
    }

    #[test]
    fn all_zero_scores_fall_back_to_first() {
        let answerer = answerer();
        let candidates = vec![candidate("alpha"), candidate("beta"), candidate("gamma")];
        assert_eq!(answerer.best_answer_text("unrelated question", &candidates), "alpha");
    }

    #[test]
    fn no_candidates_gives_fixed_message() {
        let answerer = answerer();
        assert_eq!(
            answerer.best_answer_text("anything", &[]),
            "No relevant information found in the documents."
        );
        assert!(answerer.find_best_answer("anything", &[]).is_none());
    }

    #[tokio::test]
    async fn answer_question_returns_sources() {
        let documents = vec![
            Document::new("Diabetes is managed with insulin and diet.", "diabetes.pdf", Some(1)),
            Document::new("Asthma inhalers open the airways.", "asthma.pdf", Some(2)),
        ];
        let chunks = split_documents(&documents, ChunkingConfig::new(500, 50).unwrap());
        let embedder = CharacterNgramEmbedder::default();
        let index = build_index(chunks, &embedder).await.unwrap();
        let retriever = Retriever::new(index, Box::new(embedder)).unwrap();

        let answer = answerer()
            .answer_question(&retriever, "How is diabetes managed?", 3)
            .await
            .unwrap();

        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.text, "Diabetes is managed with insulin and diet.");
    }
}
