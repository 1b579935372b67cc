use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Serialize;
use std::env;

/// Application configuration loaded from environment variables
///
/// Built once at startup and handed by reference to every component
/// constructor; nothing reads the environment after this.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub browserless_token: Option<String>,
    pub browserless_url: String,
    pub serpapi_key: Option<String>,
    pub request_timeout_secs: u64,
    pub batch_default_limit: usize,
}

/// Which external credentials are present
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServiceStatus {
    pub openai: bool,
    pub browserless: bool,
    pub serpapi: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 8080,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            browserless_token: None,
            browserless_url: "https://chrome.browserless.io".to_string(),
            serpapi_key: None,
            request_timeout_secs: 300,
            batch_default_limit: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        Ok(Self {
            database_url: non_empty_var("DATABASE_URL"),
            port: env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .context("PORT must be a valid number")?,
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_model: non_empty_var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            browserless_token: non_empty_var("BROWSERLESS_TOKEN"),
            browserless_url: non_empty_var("BROWSERLESS_URL").unwrap_or(defaults.browserless_url),
            serpapi_key: non_empty_var("SERPAPI_KEY"),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| defaults.request_timeout_secs.to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a valid number")?,
            batch_default_limit: env::var("BATCH_DEFAULT_LIMIT")
                .unwrap_or_else(|_| defaults.batch_default_limit.to_string())
                .parse()
                .context("BATCH_DEFAULT_LIMIT must be a valid number")?,
        })
    }

    /// Both required credentials (LLM + rendering service) are present.
    ///
    /// The structured-search key is optional: without it search degrades
    /// to the scrape path.
    pub fn is_configured(&self) -> bool {
        self.openai_api_key.is_some() && self.browserless_token.is_some()
    }

    pub fn service_status(&self) -> ServiceStatus {
        ServiceStatus {
            openai: self.openai_api_key.is_some(),
            browserless: self.browserless_token.is_some(),
            serpapi: self.serpapi_key.is_some(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
