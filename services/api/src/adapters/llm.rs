//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the hosted summarization and
//! question-answering LLM. It implements the `LanguageModel` port from the
//! `core` crate against any OpenAI-compatible chat completion endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use bizdesk_core::ports::{LanguageModel, PortError, PortResult};
use tracing::debug;

const SYSTEM_INSTRUCTIONS: &str = "You are a careful document analyst. Answer only from the text you are given and say so plainly when the text does not contain the answer.";

/// Providers signal throttling differently; these markers cover OpenAI
/// (`429`, `rate_limit_exceeded`) and Gemini's compatible API (`RESOURCE_EXHAUSTED`).
const RATE_LIMIT_MARKERS: [&str; 4] = ["429", "rate limit", "rate_limit", "resource_exhausted"];

/// True when a provider error message says the call was throttled.
pub fn is_rate_limited(message: &str) -> bool {
    let message = message.to_lowercase();
    RATE_LIMIT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

fn map_openai_error(e: OpenAIError) -> PortError {
    let message = e.to_string();
    if is_rate_limited(&message) {
        PortError::RateLimited(message)
    } else {
        PortError::Unexpected(message)
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LanguageModel` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiLlmAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLlmAdapter {
    /// Creates a new `OpenAiLlmAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `LanguageModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModel for OpenAiLlmAdapter {
    async fn invoke(&self, prompt: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, prompt_chars = prompt.len(), "Calling hosted model");
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        // Extract the text content from the first choice in the response.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Hosted LLM response contained no text content.".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_markers() {
        assert!(is_rate_limited("HTTP status 429 Too Many Requests"));
        assert!(is_rate_limited("Rate limit reached for gpt-4o-mini"));
        assert!(is_rate_limited("RESOURCE_EXHAUSTED: quota exceeded"));
        assert!(!is_rate_limited("invalid api key"));
    }
}
