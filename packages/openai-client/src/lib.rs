//! Pure OpenAI REST API client
//!
//! A minimal client for the chat-completion endpoint with no domain-specific
//! logic. Used for low-temperature, JSON-only extraction calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use openai_client::{ChatRequest, Message, OpenAIClient};
//!
//! let client = OpenAIClient::from_env()?;
//!
//! let value = client
//!     .complete_json(
//!         ChatRequest::new("gpt-4o-mini")
//!             .message(Message::system("Return JSON"))
//!             .message(Message::user("..."))
//!             .temperature(0.1),
//!     )
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{OpenAIError, Result};
pub use types::*;

use reqwest::Client;
use tracing::{debug, warn};

/// Pure OpenAI API client.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    /// Create a new OpenAI client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OpenAIError::Config("OPENAI_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                OpenAIError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI API error");
            return Err(OpenAIError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let chat_response: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| OpenAIError::Parse(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OpenAIError::EmptyResponse)?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "OpenAI chat completion"
        );

        Ok(ChatResponse {
            content,
            usage: chat_response.usage,
        })
    }

    /// Chat completion that must answer with a single JSON object.
    ///
    /// Forces the `json_object` response format and rejects anything that
    /// does not parse to an object.
    pub async fn complete_json(&self, request: ChatRequest) -> Result<serde_json::Value> {
        let response = self.chat_completion(request.json_object()).await?;
        parse_json_object(&response.content)
    }
}

/// Parse a model answer into a JSON object, tolerating code fences.
pub fn parse_json_object(content: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(strip_code_blocks(content))
        .map_err(|e| OpenAIError::Parse(format!("Model returned invalid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(OpenAIError::Parse(
            "Model returned JSON that is not an object".into(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = OpenAIClient::new("sk-test").with_base_url("https://custom.api.com");

        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url(), "https://custom.api.com");
    }

    #[test]
    fn test_parse_json_object() {
        let value = parse_json_object("```json\n{\"property_name\": \"Oak Ridge\"}\n```").unwrap();
        assert_eq!(value["property_name"], "Oak Ridge");
    }

    #[test]
    fn test_parse_json_rejects_non_objects() {
        assert!(matches!(
            parse_json_object("[1, 2]"),
            Err(OpenAIError::Parse(_))
        ));
        assert!(matches!(
            parse_json_object("not json"),
            Err(OpenAIError::Parse(_))
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(OpenAIError::Network("reset".into()).is_transient());
        assert!(OpenAIError::Api {
            status: 429,
            message: "slow down".into()
        }
        .is_transient());
        assert!(!OpenAIError::Parse("bad".into()).is_transient());
    }
}
