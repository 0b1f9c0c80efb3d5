//! crates/bizdesk_core/src/orchestrator.rs
//!
//! Map-then-combine prompting over document chunks.
//!
//! Every chunk is prompted on its own with no shared context, the partial
//! results are joined in chunk order, and a second prompt combines them.
//! There is no retrieval step: every chunk always goes to the model.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;

use crate::ports::{FallbackModel, LanguageModel, PortError, PortResult};
use crate::retry::RetryPolicy;

pub const CHUNK_SUMMARY_PROMPT: &str = "Please provide a concise summary of the following document chunk. \
Focus on the main topics, key points, and important details:

{doc_chunk}

Summary:";

pub const FINAL_SUMMARY_PROMPT: &str = "Please provide a concise overall summary of the following text:

{combined_summary}

Overall Summary:";

pub const CHUNK_QUESTION_PROMPT: &str = "Based on the following document chunk, provide a detailed answer to the question. \
If the information is not available in the chunk, say so.

Document chunk:
{chunk}

Question: {question}

Answer:";

pub const COMBINE_ANSWERS_PROMPT: &str = "Combine the following answers into a coherent response:

{answers}

Combined answer:";

/// Substitutes `{name}` placeholders in a single pass, so values that
/// themselves contain braces are never expanded again. Unknown placeholders
/// are left as they are.
pub fn render_prompt(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

#[derive(Clone)]
pub struct DocumentOrchestrator {
    llm: Arc<dyn LanguageModel>,
    fallback: Arc<dyn FallbackModel>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl DocumentOrchestrator {
    /// Chunks are prompted one at a time until `with_concurrency` says otherwise.
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        fallback: Arc<dyn FallbackModel>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            fallback,
            policy,
            concurrency: 1,
        }
    }

    /// Bounds how many chunk prompts are in flight. Output order is unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn summarize(&self, chunks: &[String]) -> PortResult<String> {
        if chunks.is_empty() {
            return Err(PortError::InvalidInput(
                "There are no processed documents to summarize".to_string(),
            ));
        }
        info!(chunks = chunks.len(), "Summarizing document chunks");

        let prompts = chunks
            .iter()
            .map(|chunk| render_prompt(CHUNK_SUMMARY_PROMPT, &[("doc_chunk", chunk)]))
            .collect();
        let summaries = self.map_prompts(prompts).await?;

        let combined_summary = summaries.join(" ");
        self.invoke(render_prompt(
            FINAL_SUMMARY_PROMPT,
            &[("combined_summary", &combined_summary)],
        ))
        .await
    }

    pub async fn query(&self, question: &str, chunks: &[String]) -> PortResult<String> {
        if question.trim().is_empty() {
            return Err(PortError::InvalidInput("Question must not be empty".to_string()));
        }
        if chunks.is_empty() {
            return Err(PortError::InvalidInput(
                "There are no processed documents to query".to_string(),
            ));
        }
        info!(chunks = chunks.len(), "Answering question over document chunks");

        let prompts = chunks
            .iter()
            .map(|chunk| {
                render_prompt(
                    CHUNK_QUESTION_PROMPT,
                    &[("chunk", chunk), ("question", question)],
                )
            })
            .collect();
        let answers = self.map_prompts(prompts).await?;

        let joined = answers.join(" ");
        self.invoke(render_prompt(COMBINE_ANSWERS_PROMPT, &[("answers", &joined)]))
            .await
    }

    /// Results come back in the order of `prompts` whatever the concurrency.
    async fn map_prompts(&self, prompts: Vec<String>) -> PortResult<Vec<String>> {
        stream::iter(prompts)
            .map(|prompt| self.invoke(prompt))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn invoke(&self, prompt: String) -> PortResult<String> {
        self.policy
            .run(&prompt, self.fallback.as_ref(), || self.llm.invoke(&prompt))
            .await
    }
}
