//! Direct fetcher - plain HTTP GET with browser-like headers
//!
//! The cheap tier: most property sites serve their content without
//! JavaScript. No rendering, so SPA shells come back nearly empty and the
//! content fetcher escalates.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::html_text::{extract_meta_description, extract_title, visible_text};
use super::{BaseFetchStrategy, FetchMethod, FetchedPage};

pub const DIRECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Realistic desktop user agents, rotated per request.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Normalize URL by adding https:// if no scheme is present
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

pub struct DirectFetcher {
    client: reqwest::Client,
}

impl DirectFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DIRECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, random_user_agent())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::UPGRADE_INSECURE_REQUESTS, "1")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }
}

/// Build a page from raw HTML: title and description by pattern, body text
/// with scripts/styles stripped.
pub fn page_from_html(url: &str, html: &str, method: FetchMethod) -> FetchedPage {
    FetchedPage {
        url: url.to_string(),
        title: extract_title(html),
        description: extract_meta_description(html),
        content: visible_text(html),
        method,
    }
}

#[async_trait]
impl BaseFetchStrategy for DirectFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Direct
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let url = normalize_url(url);
        debug!(url = %url, "Direct fetch");

        let html = self.fetch_html(&url).await?;
        Ok(page_from_html(&url, &html, FetchMethod::Direct))
    }
}
