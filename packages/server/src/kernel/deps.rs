//! Server dependencies for the enrichment pipeline (using traits for testability)
//!
//! This module provides the central dependency container handed to every
//! route. External services sit behind the `Base*` traits so tests can swap
//! in the mocks from `test_dependencies`.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::domains::properties::batch::BatchDriver;
use crate::domains::properties::enrichment::orchestrator::EnrichmentOrchestrator;
use crate::domains::properties::error::EnrichmentError;
use crate::domains::properties::units::discovery::UnitDiscoveryService;
use crate::kernel::ai::OpenAIExtractor;
use crate::kernel::browserless_client::BrowserlessClient;
use crate::kernel::content_fetcher::ContentFetcher;
use crate::kernel::direct_fetcher::DirectFetcher;
use crate::kernel::serp_client::SerpApiClient;
use crate::kernel::{
    BaseAI, BaseFetchStrategy, BasePropertyStore, BaseSearchService, BaseUnitDiscovery,
};

/// Floor plans with their units make for long answers.
const UNIT_DISCOVERY_MAX_TOKENS: u32 = 4000;

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to routes (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BasePropertyStore>,
    /// Structured extraction from page and search text
    pub ai: Arc<dyn BaseAI>,
    /// Direct retrieval first, rendered retrieval as escalation
    pub fetcher: Arc<ContentFetcher>,
    /// Structured search API; `None` means search runs on the scrape path only
    pub search_service: Option<Arc<dyn BaseSearchService>>,
    pub unit_discovery: Arc<dyn BaseUnitDiscovery>,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        store: Arc<dyn BasePropertyStore>,
        ai: Arc<dyn BaseAI>,
        fetcher: Arc<ContentFetcher>,
        search_service: Option<Arc<dyn BaseSearchService>>,
        unit_discovery: Arc<dyn BaseUnitDiscovery>,
    ) -> Self {
        Self {
            store,
            ai,
            fetcher,
            search_service,
            unit_discovery,
        }
    }

    /// Build the production clients from configuration.
    ///
    /// Fails with `NotConfigured` when either required credential is absent;
    /// a missing search key only drops the structured search tier.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn BasePropertyStore>,
    ) -> Result<Self, EnrichmentError> {
        let openai_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| EnrichmentError::NotConfigured("OPENAI_API_KEY".into()))?;
        let browserless_token = config
            .browserless_token
            .clone()
            .ok_or_else(|| EnrichmentError::NotConfigured("BROWSERLESS_TOKEN".into()))?;

        let direct: Arc<dyn BaseFetchStrategy> = Arc::new(DirectFetcher::new()?);
        let rendered: Arc<dyn BaseFetchStrategy> = Arc::new(BrowserlessClient::new(
            config.browserless_url.clone(),
            browserless_token,
        )?);
        let fetcher = Arc::new(ContentFetcher::new(vec![direct, rendered]));

        let ai: Arc<dyn BaseAI> = Arc::new(OpenAIExtractor::new(
            openai_key.clone(),
            config.openai_model.clone(),
        ));
        let unit_ai: Arc<dyn BaseAI> = Arc::new(
            OpenAIExtractor::new(openai_key, config.openai_model.clone())
                .with_max_tokens(UNIT_DISCOVERY_MAX_TOKENS),
        );

        let search_service: Option<Arc<dyn BaseSearchService>> = match &config.serpapi_key {
            Some(key) => Some(Arc::new(SerpApiClient::new(key.clone())?)),
            None => None,
        };

        let unit_discovery: Arc<dyn BaseUnitDiscovery> =
            Arc::new(UnitDiscoveryService::new(fetcher.clone(), unit_ai));

        info!(
            model = %config.openai_model,
            structured_search = search_service.is_some(),
            "Enrichment services initialized"
        );

        Ok(Self::new(store, ai, fetcher, search_service, unit_discovery))
    }

    pub fn orchestrator(&self) -> EnrichmentOrchestrator {
        EnrichmentOrchestrator::new(
            self.search_service.clone(),
            self.fetcher.clone(),
            self.ai.clone(),
        )
    }

    pub fn batch_driver(&self, default_limit: usize) -> BatchDriver {
        BatchDriver::new(
            self.store.clone(),
            Arc::new(self.orchestrator()),
            self.unit_discovery.clone(),
            default_limit,
        )
    }
}
