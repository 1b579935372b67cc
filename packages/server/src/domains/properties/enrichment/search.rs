//! Search provider - resolve a property's name and website from its address
//!
//! An ordered chain of strategies: the structured search API when a key is
//! configured, then a scrape of a general results page read by the
//! extractor. The chain stops at the first strategy that finds a name or a
//! website. Aggregator domains are never returned as the website.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::domains::properties::enrichment::denylist::is_denylisted;
use crate::domains::properties::enrichment::extraction::{clamp_confidence, SearchExtraction};
use crate::domains::properties::enrichment::prompts::{
    search_extraction_user_prompt, SEARCH_EXTRACTION_PROMPT,
};
use crate::domains::properties::enrichment::types::{SourceAttempt, SuggestionSource};
use crate::kernel::content_fetcher::ContentFetcher;
use crate::kernel::{BaseAI, BaseSearchService, SearchResponse};

pub const KNOWLEDGE_GRAPH_CONFIDENCE: f64 = 0.95;
pub const ORGANIC_RESULT_CONFIDENCE: f64 = 0.85;

/// Ceiling for anything read off a scraped results page
pub const SCRAPE_CONFIDENCE_CAP: f64 = 0.75;

const MIN_NAME_CHARS: usize = 3;
const MAX_NAME_CHARS: usize = 60;

const SCRAPE_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

lazy_static! {
    static ref TRAILING_STATE_RE: Regex = Regex::new(r"[,\s]+[A-Z]{2}$").unwrap();
}

/// What a search run concluded about the property
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResolution {
    pub property_name: Option<String>,
    pub website_url: Option<String>,
    pub confidence: f64,
    pub source: Option<SuggestionSource>,
}

impl SearchResolution {
    pub fn found_anything(&self) -> bool {
        self.property_name.is_some() || self.website_url.is_some()
    }
}

/// One strategy's run, including its audit trail
#[derive(Debug, Clone)]
pub struct StrategyRun {
    pub resolution: SearchResolution,
    pub attempt: SourceAttempt,
    pub error: Option<String>,
}

/// Provider result: the resolution plus every attempt made, in call order
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub resolution: SearchResolution,
    pub attempts: Vec<SourceAttempt>,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn source(&self) -> SuggestionSource;

    /// Never fails; failures come back as an unsuccessful attempt.
    async fn run(&self, address: &str) -> StrategyRun;
}

pub fn search_query(address: &str) -> String {
    format!("{} apartments leasing office", address)
}

// =============================================================================
// Structured search
// =============================================================================

pub struct StructuredSearch {
    service: Arc<dyn BaseSearchService>,
}

impl StructuredSearch {
    pub fn new(service: Arc<dyn BaseSearchService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SearchStrategy for StructuredSearch {
    fn source(&self) -> SuggestionSource {
        SuggestionSource::SearchApi
    }

    async fn run(&self, address: &str) -> StrategyRun {
        let query = search_query(address);
        let started = Instant::now();

        match self.service.search(&query).await {
            Ok(response) => {
                let resolution = pick_from_response(&response);
                info!(
                    source = "search_api",
                    query = %query,
                    success = true,
                    result_count = response.result_count(),
                    found_name = resolution.property_name.is_some(),
                    found_website = resolution.website_url.is_some(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Structured search completed"
                );
                StrategyRun {
                    resolution,
                    attempt: SourceAttempt {
                        source: SuggestionSource::SearchApi,
                        query_or_url: query,
                        success: true,
                        result_count: Some(response.result_count()),
                    },
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    source = "search_api",
                    query = %query,
                    success = false,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Structured search failed"
                );
                StrategyRun {
                    resolution: SearchResolution::default(),
                    attempt: SourceAttempt {
                        source: SuggestionSource::SearchApi,
                        query_or_url: query,
                        success: false,
                        result_count: None,
                    },
                    error: Some(format!("Search API failed: {}", e)),
                }
            }
        }
    }
}

/// Read name and website off a structured response: knowledge graph first,
/// then the best-ranked organic result that is not an aggregator.
pub fn pick_from_response(response: &SearchResponse) -> SearchResolution {
    let mut name = None;
    let mut website = None;
    let mut confidence = 0.0;

    if let Some(kg) = &response.knowledge_graph {
        if let Some(title) = kg.title.as_deref().and_then(clean_title) {
            name = Some(title);
            confidence = KNOWLEDGE_GRAPH_CONFIDENCE;
        }
        if let Some(site) = kg.website.as_deref().filter(|w| !is_denylisted(w)) {
            website = Some(site.to_string());
            confidence = KNOWLEDGE_GRAPH_CONFIDENCE;
        }
    }

    let mut organic: Vec<_> = response.organic.iter().collect();
    organic.sort_by_key(|r| r.position);

    // Name and website come from the same organic result
    if website.is_none() {
        if let Some(result) = organic.into_iter().find(|r| !is_denylisted(&r.url)) {
            website = Some(result.url.clone());
            if name.is_none() {
                name = clean_title(&result.title);
            }
            if confidence == 0.0 {
                confidence = ORGANIC_RESULT_CONFIDENCE;
            }
        }
    }

    SearchResolution {
        property_name: name,
        website_url: website,
        confidence,
        source: Some(SuggestionSource::SearchApi),
    }
}

/// Property name from a page title: text before the first separator, minus
/// a trailing state code, between 3 and 60 characters.
pub fn clean_title(title: &str) -> Option<String> {
    let mut head = title.trim();
    for separator in ["|", " – ", " — ", " - ", " · "] {
        if let Some(idx) = head.find(separator) {
            head = &head[..idx];
        }
    }

    let cleaned = TRAILING_STATE_RE.replace(head.trim(), "");
    let cleaned = cleaned.trim().trim_end_matches([',', '-', ':']).trim();

    let chars = cleaned.chars().count();
    (MIN_NAME_CHARS..=MAX_NAME_CHARS)
        .contains(&chars)
        .then(|| cleaned.to_string())
}

// =============================================================================
// Scrape-and-extract search (last resort)
// =============================================================================

pub struct ScrapeSearch {
    fetcher: Arc<ContentFetcher>,
    ai: Arc<dyn BaseAI>,
}

impl ScrapeSearch {
    pub fn new(fetcher: Arc<ContentFetcher>, ai: Arc<dyn BaseAI>) -> Self {
        Self { fetcher, ai }
    }

    pub fn results_page_url(address: &str) -> String {
        Url::parse_with_params(SCRAPE_SEARCH_URL, &[("q", search_query(address))])
            .map(|u| u.to_string())
            .unwrap_or_else(|_| SCRAPE_SEARCH_URL.to_string())
    }

    fn failed(url: String, error: String) -> StrategyRun {
        StrategyRun {
            resolution: SearchResolution::default(),
            attempt: SourceAttempt {
                source: SuggestionSource::SearchScrape,
                query_or_url: url,
                success: false,
                result_count: None,
            },
            error: Some(error),
        }
    }
}

#[async_trait]
impl SearchStrategy for ScrapeSearch {
    fn source(&self) -> SuggestionSource {
        SuggestionSource::SearchScrape
    }

    async fn run(&self, address: &str) -> StrategyRun {
        let url = Self::results_page_url(address);
        let started = Instant::now();

        let page = self.fetcher.fetch(&url).await;
        if !page.success {
            let error = page.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(source = "search_scrape", url = %url, success = false, error = %error, "Results page fetch failed");
            return Self::failed(url, format!("Search scrape failed: {}", error));
        }

        let user_prompt = search_extraction_user_prompt(address, &page.content);
        let extraction = match self
            .ai
            .extract_json(SEARCH_EXTRACTION_PROMPT, &user_prompt)
            .await
            .and_then(SearchExtraction::from_value)
        {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(source = "search_scrape", url = %url, success = false, error = %e, "Search extraction failed");
                return Self::failed(url, format!("Search extraction failed: {}", e));
            }
        };

        let website = extraction
            .website_url
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty() && !is_denylisted(w))
            .map(str::to_string);
        let name = extraction.property_name.as_deref().and_then(clean_title);
        let confidence = clamp_confidence(extraction.confidence, 0.5).min(SCRAPE_CONFIDENCE_CAP);

        info!(
            source = "search_scrape",
            url = %url,
            success = true,
            found_name = name.is_some(),
            found_website = website.is_some(),
            confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape search completed"
        );

        StrategyRun {
            resolution: SearchResolution {
                property_name: name,
                website_url: website,
                confidence,
                source: Some(SuggestionSource::SearchScrape),
            },
            attempt: SourceAttempt {
                source: SuggestionSource::SearchScrape,
                query_or_url: url,
                success: true,
                result_count: None,
            },
            error: None,
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

pub struct SearchProvider {
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl SearchProvider {
    /// Structured search first when a service is configured; scraping always last.
    pub fn new(
        search_service: Option<Arc<dyn BaseSearchService>>,
        fetcher: Arc<ContentFetcher>,
        ai: Arc<dyn BaseAI>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn SearchStrategy>> = Vec::new();
        if let Some(service) = search_service {
            strategies.push(Box::new(StructuredSearch::new(service)));
        }
        strategies.push(Box::new(ScrapeSearch::new(fetcher, ai)));
        Self { strategies }
    }

    pub fn with_strategies(strategies: Vec<Box<dyn SearchStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn sources(&self) -> Vec<SuggestionSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }

    pub async fn resolve(&self, address: &str) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();

        for strategy in &self.strategies {
            let run = strategy.run(address).await;
            outcome.attempts.push(run.attempt);
            if let Some(error) = run.error {
                outcome.errors.push(error);
            }

            let mut resolution = run.resolution;
            if resolution.website_url.as_deref().is_some_and(is_denylisted) {
                resolution.website_url = None;
            }

            if resolution.found_anything() {
                outcome.resolution = resolution;
                break;
            }
        }

        outcome
    }
}
