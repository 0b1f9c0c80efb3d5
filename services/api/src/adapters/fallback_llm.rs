//! services/api/src/adapters/fallback_llm.rs
//!
//! This module contains the adapter for the small local model the retry policy
//! falls back to once the hosted model keeps failing. It implements the
//! `FallbackModel` port against an Ollama-style `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use bizdesk_core::ports::{FallbackModel, PortError, PortResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GenerateOptions {
    /// Caps the number of generated tokens.
    num_predict: usize,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct LocalFallbackAdapter {
    client: Client,
    base_url: String,
    model: String,
}

impl LocalFallbackAdapter {
    pub fn new(client: Client, base_url: &str, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

//=========================================================================================
// `FallbackModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl FallbackModel for LocalFallbackAdapter {
    async fn generate(&self, text: &str, max_length: usize) -> PortResult<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: text,
            stream: false,
            options: GenerateOptions {
                num_predict: max_length,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(GENERATE_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Fallback request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Unexpected(format!(
                "Fallback model returned {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse fallback response: {}", e)))?;
        debug!(model = %self.model, response_len = result.response.len(), "Fallback generation complete");
        Ok(result.response)
    }
}
