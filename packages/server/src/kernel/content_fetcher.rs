//! Content fetcher - ordered retrieval tiers with escalation on thin content
//!
//! Tiers are tried in order (direct HTTP first, rendered browser last). A
//! tier's page is accepted when it carries at least [`MIN_CONTENT_CHARS`] of
//! text, or when it is the last tier. Adding a tier is a change to the list
//! handed to [`ContentFetcher::new`], not to this control flow.
//!
//! Failures are data: `fetch` always returns a [`FetchOutcome`], never an error.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{BaseFetchStrategy, FetchMethod, FetchedPage};

/// Below this many characters the page is treated as a JS shell or a block
/// page and the next tier is tried.
pub const MIN_CONTENT_CHARS: usize = 500;

/// Result of one fetch across all tiers
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchOutcome {
    pub success: bool,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: String,
    pub method: Option<FetchMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    fn from_page(page: FetchedPage) -> Self {
        Self {
            success: true,
            url: page.url,
            title: page.title,
            description: page.description,
            content: page.content,
            method: Some(page.method),
            error: None,
        }
    }

    fn failed(url: &str, errors: &[String]) -> Self {
        Self {
            success: false,
            url: url.to_string(),
            error: Some(if errors.is_empty() {
                "no fetch tiers configured".to_string()
            } else {
                errors.join("; ")
            }),
            ..Default::default()
        }
    }

    pub fn content_chars(&self) -> usize {
        self.content.chars().count()
    }
}

pub struct ContentFetcher {
    tiers: Vec<Arc<dyn BaseFetchStrategy>>,
}

impl ContentFetcher {
    pub fn new(tiers: Vec<Arc<dyn BaseFetchStrategy>>) -> Self {
        Self { tiers }
    }

    pub fn tier_methods(&self) -> Vec<FetchMethod> {
        self.tiers.iter().map(|t| t.method()).collect()
    }

    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut errors = Vec::new();
        let mut best_partial: Option<FetchedPage> = None;
        let last = self.tiers.len().saturating_sub(1);

        for (idx, tier) in self.tiers.iter().enumerate() {
            let method = tier.method();
            let started = Instant::now();

            match tier.fetch(url).await {
                Ok(page) => {
                    let chars = page.content.chars().count();
                    let elapsed_ms = started.elapsed().as_millis() as u64;

                    if chars >= MIN_CONTENT_CHARS || idx == last {
                        info!(
                            url = %url,
                            method = %method,
                            chars,
                            elapsed_ms,
                            "Fetched page content"
                        );
                        return FetchOutcome::from_page(page);
                    }

                    debug!(
                        url = %url,
                        method = %method,
                        chars,
                        elapsed_ms,
                        "Content too thin, escalating"
                    );
                    let longer = best_partial
                        .as_ref()
                        .map_or(true, |b| b.content.chars().count() < chars);
                    if longer {
                        best_partial = Some(page);
                    }
                }
                Err(e) => {
                    warn!(
                        url = %url,
                        method = %method,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "Fetch tier failed"
                    );
                    errors.push(format!("{}: {}", method, e));
                }
            }
        }

        match best_partial {
            Some(page) => FetchOutcome::from_page(page),
            None => FetchOutcome::failed(url, &errors),
        }
    }
}
