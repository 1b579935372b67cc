// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient};
use std::time::Instant;
use tracing::{debug, warn};

use super::BaseAI;

/// Extraction is deterministic, not creative.
pub const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Short structured answers only.
pub const EXTRACTION_MAX_TOKENS: u32 = 1000;

/// OpenAI implementation of BaseAI
#[derive(Clone)]
pub struct OpenAIExtractor {
    client: OpenAIClient,
    model: String,
    max_tokens: u32,
}

impl OpenAIExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAIClient::new(api_key),
            model: model.into(),
            max_tokens: EXTRACTION_MAX_TOKENS,
        }
    }

    pub fn with_client(mut self, client: OpenAIClient) -> Self {
        self.client = client;
        self
    }

    /// Larger budget for list-heavy answers (floor plans with units)
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl BaseAI for OpenAIExtractor {
    async fn extract_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value> {
        let started = Instant::now();
        let request = ChatRequest::new(&self.model)
            .message(Message::system(system_prompt))
            .message(Message::user(user_prompt))
            .temperature(EXTRACTION_TEMPERATURE)
            .max_tokens(self.max_tokens);

        match self.client.complete_json(request).await {
            Ok(value) => {
                debug!(
                    model = %self.model,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Extraction completed"
                );
                Ok(value)
            }
            Err(e) => {
                warn!(
                    model = %self.model,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    transient = e.is_transient(),
                    error = %e,
                    "Extraction failed"
                );
                Err(e).context("OpenAI extraction failed")
            }
        }
    }
}
