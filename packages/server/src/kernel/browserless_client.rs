//! Browserless client - headless-browser rendering over the REST `/content` API
//!
//! The expensive tier. The page is rendered in a remote Chrome with
//! stealth enabled, heavy resources blocked, a randomized viewport and user
//! agent, and a short randomized settle delay. Main-content text is then
//! extracted locally from the rendered HTML.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::direct_fetcher::{normalize_url, random_user_agent};
use super::html_text::{extract_meta_description, extract_title, main_content_text};
use super::{BaseFetchStrategy, FetchMethod, FetchedPage};

/// Navigation timeout handed to the browser
pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Settle delay after DOMContentLoaded, randomized per request
pub const SETTLE_DELAY_MS: std::ops::RangeInclusive<u64> = 1_500..=3_000;

const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1536, 864), (1440, 900), (1366, 768), (1280, 800)];

const BLOCKED_RESOURCE_TYPES: &[&str] = &["image", "font", "stylesheet", "media"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    goto_options: GotoOptions,
    reject_resource_types: &'static [&'static str],
    wait_for_timeout: u64,
    viewport: Viewport,
    user_agent: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

#[derive(Debug, Serialize)]
struct Viewport {
    width: u32,
    height: u32,
}

/// Browserless implementation of BaseFetchStrategy
pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl BrowserlessClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        // Navigation plus settle delay plus transfer
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(NAVIGATION_TIMEOUT_MS + 15_000))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn content_request(url: &str) -> ContentRequest<'_> {
        let (width, height) = VIEWPORTS[fastrand::usize(..VIEWPORTS.len())];
        ContentRequest {
            url,
            goto_options: GotoOptions {
                wait_until: "domcontentloaded",
                timeout: NAVIGATION_TIMEOUT_MS,
            },
            reject_resource_types: BLOCKED_RESOURCE_TYPES,
            wait_for_timeout: fastrand::u64(SETTLE_DELAY_MS),
            viewport: Viewport { width, height },
            user_agent: random_user_agent(),
        }
    }

    async fn render(&self, url: &str) -> Result<String> {
        let endpoint = format!("{}/content", self.base_url);
        let body = Self::content_request(url);

        let response = self
            .client
            .post(&endpoint)
            .query(&[("token", self.token.as_str()), ("stealth", "true")])
            .json(&body)
            .send()
            .await
            .context("Browserless request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Browserless error ({}): {}", status, error_text);
        }

        response
            .text()
            .await
            .context("Failed to read rendered HTML")
    }
}

#[async_trait]
impl BaseFetchStrategy for BrowserlessClient {
    fn method(&self) -> FetchMethod {
        FetchMethod::Rendered
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let url = normalize_url(url);
        debug!(url = %url, "Rendered fetch");

        let html = self.render(&url).await?;

        Ok(FetchedPage {
            title: extract_title(&html),
            description: extract_meta_description(&html),
            content: main_content_text(&html),
            url,
            method: FetchMethod::Rendered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_request_shape() {
        let request = BrowserlessClient::content_request("https://oakridge.com");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["url"], "https://oakridge.com");
        assert_eq!(json["gotoOptions"]["waitUntil"], "domcontentloaded");
        assert_eq!(json["gotoOptions"]["timeout"], 30_000);
        assert_eq!(
            json["rejectResourceTypes"],
            serde_json::json!(["image", "font", "stylesheet", "media"])
        );

        let wait = json["waitForTimeout"].as_u64().unwrap();
        assert!((1_500..=3_000).contains(&wait));
        assert!(json["viewport"]["width"].as_u64().unwrap() >= 1280);
        assert!(json["userAgent"].as_str().unwrap().starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = BrowserlessClient::new("https://chrome.browserless.io/", "token").unwrap();
        assert_eq!(client.base_url, "https://chrome.browserless.io");
    }
}
