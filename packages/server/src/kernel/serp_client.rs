use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{BaseSearchService, KnowledgeGraph, SearchResponse, SearchResult};

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";

/// SerpAPI client for structured Google search
pub struct SerpApiClient {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
}

/// SerpAPI response (only the parts the pipeline reads)
#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    knowledge_graph: Option<SerpKnowledgeGraph>,
    #[serde(default)]
    organic_results: Vec<SerpOrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpKnowledgeGraph {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpOrganicResult {
    #[serde(default)]
    position: Option<usize>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

impl SerpResponse {
    fn into_search_response(self) -> SearchResponse {
        let knowledge_graph = self.knowledge_graph.map(|kg| KnowledgeGraph {
            title: kg.title,
            website: kg.website,
            phone: kg.phone,
        });

        let organic = self
            .organic_results
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .enumerate()
            .map(|(idx, r)| SearchResult {
                position: r.position.unwrap_or(idx + 1),
                title: r.title,
                url: r.link,
                snippet: r.snippet,
            })
            .collect();

        SearchResponse {
            knowledge_graph,
            organic,
        }
    }
}

impl SerpApiClient {
    /// Create a new SerpAPI client
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            endpoint: SERPAPI_ENDPOINT.to_string(),
        })
    }

    /// Point at a different endpoint (proxies, test servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl BaseSearchService for SerpApiClient {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        debug!(query = %query, "SerpAPI search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", "10"),
            ])
            .send()
            .await
            .context("Failed to send SerpAPI search request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("SerpAPI error {}: {}", status, body);
        }

        let serp: SerpResponse = response
            .json()
            .await
            .context("Failed to parse SerpAPI response")?;

        if let Some(error) = serp.error.as_deref() {
            // "Google hasn't returned any results" is an empty result, not a failure
            if !error.to_lowercase().contains("hasn't returned any results") {
                anyhow::bail!("SerpAPI error: {}", error);
            }
        }

        Ok(serp.into_search_response())
    }
}
