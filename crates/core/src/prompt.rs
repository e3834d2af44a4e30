use crate::models::RetrievedChunk;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Use the pieces of information provided in the context to answer user's question.
If you dont know the answer, just say that you dont know, dont try to make up an answer.
Dont provide anything out of the given context

Context: {context}
Question: {question}

Start the answer directly. No small talk please.
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Returns `None` unless the template mentions both `{context}` and
    /// `{question}`.
    pub fn new(template: impl Into<String>) -> Option<Self> {
        let template = template.into();
        if template.contains("{context}") && template.contains("{question}") {
            Some(Self { template })
        } else {
            None
        }
    }

    /// Fills both placeholders in a single pass over the template, so braces
    /// inside `context` or `question` are copied through untouched.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut rendered = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            rendered.push_str(literal);
            if let Some(after) = tail.strip_prefix("{context}") {
                rendered.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{question}") {
                rendered.push_str(question);
                rest = after;
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }

        rendered.push_str(rest);
        rendered
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
