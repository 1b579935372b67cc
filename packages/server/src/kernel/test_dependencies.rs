// TestDependencies - mock implementations for testing
//
// Provides mock services and an in-memory property store that can be
// injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::content_fetcher::ContentFetcher;
use super::{
    BaseAI, BaseFetchStrategy, BasePropertyStore, BaseSearchService, BaseUnitDiscovery,
    FetchMethod, FetchedPage, SearchResponse, ServerDeps,
};
use crate::domains::properties::enrichment::types::{EnrichableField, FieldValue};
use crate::domains::properties::models::property::ensure_shape;
use crate::domains::properties::models::{
    EnrichmentStatus, FloorPlan, Property, PropertySelection, Special, StatusCounts, Unit,
};
use crate::domains::properties::units::types::UnitDiscoveryResult;

/// Pop the next queued response; the last one repeats forever.
fn next_sticky<T: Clone>(queue: &Mutex<Vec<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    match queue.len() {
        0 => None,
        1 => queue.first().cloned(),
        _ => Some(queue.remove(0)),
    }
}

// =============================================================================
// Mock Search Service
// =============================================================================

pub struct MockSearchService {
    responses: Mutex<Vec<std::result::Result<SearchResponse, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MockSearchService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: SearchResponse) -> Self {
        self.responses.lock().unwrap().push(Ok(response));
        self
    }

    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().unwrap().push(Err(error.to_string()));
        self
    }

    /// Get all queries that were searched
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockSearchService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseSearchService for MockSearchService {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        self.calls.lock().unwrap().push(query.to_string());

        match next_sticky(&self.responses) {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Ok(SearchResponse::default()),
        }
    }
}

// =============================================================================
// Mock Fetch Strategy
// =============================================================================

pub struct MockFetchStrategy {
    method: FetchMethod,
    responses: Mutex<Vec<std::result::Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetchStrategy {
    pub fn new(method: FetchMethod) -> Self {
        Self {
            method,
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue page text to return
    pub fn with_content(self, content: &str) -> Self {
        self.responses.lock().unwrap().push(Ok(content.to_string()));
        self
    }

    /// Queue a failure
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().unwrap().push(Err(error.to_string()));
        self
    }

    /// Get all URLs that were fetched
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseFetchStrategy for MockFetchStrategy {
    fn method(&self) -> FetchMethod {
        self.method
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.calls.lock().unwrap().push(url.to_string());

        let content = match next_sticky(&self.responses) {
            Some(Ok(content)) => content,
            Some(Err(e)) => anyhow::bail!(e),
            None => "Mock page content".to_string(),
        };

        Ok(FetchedPage {
            url: url.to_string(),
            title: Some("Mock Page".to_string()),
            description: None,
            content,
            method: self.method,
        })
    }
}

// =============================================================================
// Mock AI (JSON extraction)
// =============================================================================

/// A prompt sent to the mock
#[derive(Debug, Clone)]
pub struct AICall {
    pub system_prompt: String,
    pub user_prompt: String,
}

pub struct MockAI {
    rules: Mutex<Vec<(String, std::result::Result<serde_json::Value, String>)>>,
    responses: Mutex<Vec<serde_json::Value>>,
    calls: Mutex<Vec<AICall>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `response` whenever either prompt contains `needle`
    pub fn when_prompt_contains(self, needle: &str, response: serde_json::Value) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Ok(response)));
        self
    }

    /// Fail whenever either prompt contains `needle`
    pub fn failing_when_prompt_contains(self, needle: &str, error: &str) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Err(error.to_string())));
        self
    }

    /// Queue a response for prompts no rule matches
    pub fn with_response(self, response: serde_json::Value) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn calls(&self) -> Vec<AICall> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a prompt containing the given text was sent
    pub fn was_called_with(&self, text: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.system_prompt.contains(text) || c.user_prompt.contains(text))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn extract_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value> {
        self.calls.lock().unwrap().push(AICall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        });

        let matched = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| system_prompt.contains(needle) || user_prompt.contains(needle))
            .map(|(_, response)| response.clone());

        match matched {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => next_sticky(&self.responses)
                .ok_or_else(|| anyhow::anyhow!("MockAI has no response for this prompt")),
        }
    }
}

// =============================================================================
// Mock Unit Discovery
// =============================================================================

pub struct MockUnitDiscovery {
    responses: Mutex<Vec<std::result::Result<UnitDiscoveryResult, String>>>,
    calls: Mutex<Vec<String>>,
}

impl MockUnitDiscovery {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(self, result: UnitDiscoveryResult) -> Self {
        self.responses.lock().unwrap().push(Ok(result));
        self
    }

    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().unwrap().push(Err(error.to_string()));
        self
    }

    /// Get all leasing URLs that were scanned
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockUnitDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseUnitDiscovery for MockUnitDiscovery {
    async fn discover(&self, leasing_url: &str) -> Result<UnitDiscoveryResult> {
        self.calls.lock().unwrap().push(leasing_url.to_string());

        match next_sticky(&self.responses) {
            Some(Ok(mut result)) => {
                result.source_url = leasing_url.to_string();
                Ok(result)
            }
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => Ok(UnitDiscoveryResult {
                source_url: leasing_url.to_string(),
                ..Default::default()
            }),
        }
    }
}

// =============================================================================
// In-memory property store
// =============================================================================

#[derive(Default)]
struct StoreState {
    properties: Vec<Property>,
    floor_plans: Vec<FloorPlan>,
    units: Vec<Unit>,
    specials: Vec<Special>,
    field_writes: Vec<(Uuid, Vec<EnrichableField>)>,
    status_writes: Vec<(Uuid, EnrichmentStatus)>,
}

/// BasePropertyStore backed by vectors. Insertion order stands in for
/// `created_at` ordering.
#[derive(Default)]
pub struct InMemoryPropertyStore {
    state: Mutex<StoreState>,
    failing: Mutex<HashSet<Uuid>>,
}

impl InMemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(self, property: Property) -> Self {
        self.insert_property(property);
        self
    }

    pub fn insert_property(&self, property: Property) {
        self.state.lock().unwrap().properties.push(property);
    }

    /// Every write touching this property fails from now on
    pub fn fail_writes_for(&self, id: Uuid) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn property(&self, id: Uuid) -> Option<Property> {
        self.state
            .lock()
            .unwrap()
            .properties
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Enrichable-field writes, in order: (property, fields written)
    pub fn field_writes(&self) -> Vec<(Uuid, Vec<EnrichableField>)> {
        self.state.lock().unwrap().field_writes.clone()
    }

    /// Status-only transitions, in order
    pub fn status_writes(&self) -> Vec<(Uuid, EnrichmentStatus)> {
        self.state.lock().unwrap().status_writes.clone()
    }

    pub fn floor_plans(&self) -> Vec<FloorPlan> {
        self.state.lock().unwrap().floor_plans.clone()
    }

    pub fn units(&self) -> Vec<Unit> {
        self.state.lock().unwrap().units.clone()
    }

    pub fn specials(&self) -> Vec<Special> {
        self.state.lock().unwrap().specials.clone()
    }

    fn check_writable(&self, id: Uuid) -> Result<()> {
        if self.failing.lock().unwrap().contains(&id) {
            anyhow::bail!("simulated write failure for property {}", id);
        }
        Ok(())
    }

    fn with_property_mut<F: FnOnce(&mut Property)>(&self, id: Uuid, f: F) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let property = state
            .properties
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| anyhow::anyhow!("property {} not found", id))?;
        f(property);
        Ok(())
    }

    fn select<F: Fn(&Property) -> bool>(&self, limit: usize, pred: F) -> Vec<Property> {
        self.state
            .lock()
            .unwrap()
            .properties
            .iter()
            .filter(|p| pred(p))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BasePropertyStore for InMemoryPropertyStore {
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>> {
        Ok(self.property(id))
    }

    async fn select_for_enrichment(&self, selection: &PropertySelection) -> Result<Vec<Property>> {
        Ok(self.select(selection.limit, |p| selection.matches_enrichment(p)))
    }

    async fn select_for_unit_scan(&self, selection: &PropertySelection) -> Result<Vec<Property>> {
        Ok(self.select(selection.limit, |p| selection.matches_unit_scan(p)))
    }

    async fn apply_enrichment(
        &self,
        id: Uuid,
        fields: &[(EnrichableField, FieldValue)],
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_writable(id)?;
        for (field, value) in fields {
            ensure_shape(*field, value)?;
        }
        self.with_property_mut(id, |p| {
            for (field, value) in fields {
                // Shapes were checked above
                let _ = p.set_field_value(*field, value.clone());
            }
            p.enrichment_status = Some(EnrichmentStatus::Enriched.to_string());
            p.enriched_at = Some(at);
        })?;
        self.state
            .lock()
            .unwrap()
            .field_writes
            .push((id, fields.iter().map(|(f, _)| *f).collect()));
        Ok(())
    }

    async fn set_enrichment_status(&self, id: Uuid, status: EnrichmentStatus) -> Result<()> {
        self.check_writable(id)?;
        self.with_property_mut(id, |p| p.enrichment_status = Some(status.to_string()))?;
        self.state.lock().unwrap().status_writes.push((id, status));
        Ok(())
    }

    async fn mark_units_scanned(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.check_writable(id)?;
        self.with_property_mut(id, |p| p.units_scanned_at = Some(at))
    }

    async fn status_counts(&self) -> Result<StatusCounts> {
        let state = self.state.lock().unwrap();
        let mut counts = StatusCounts::default();
        for p in &state.properties {
            match p.status() {
                EnrichmentStatus::Pending => counts.pending += 1,
                EnrichmentStatus::Enriched => counts.enriched += 1,
                EnrichmentStatus::Reviewed => counts.reviewed += 1,
                EnrichmentStatus::Failed => counts.failed += 1,
            }
            if p.units_scanned_at.is_some() {
                counts.units_scanned += 1;
            } else if p.has_leasing_link() {
                counts.units_pending += 1;
            }
        }
        Ok(counts)
    }

    async fn floor_plans_for(&self, property_id: Uuid) -> Result<Vec<FloorPlan>> {
        Ok(self
            .floor_plans()
            .into_iter()
            .filter(|fp| fp.property_id == property_id)
            .collect())
    }

    async fn insert_floor_plan(&self, plan: &FloorPlan) -> Result<()> {
        self.check_writable(plan.property_id)?;
        self.state.lock().unwrap().floor_plans.push(plan.clone());
        Ok(())
    }

    async fn update_floor_plan(&self, plan: &FloorPlan) -> Result<()> {
        self.check_writable(plan.property_id)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.floor_plans.iter_mut().find(|fp| fp.id == plan.id) {
            *existing = plan.clone();
        }
        Ok(())
    }

    async fn units_for(&self, property_id: Uuid) -> Result<Vec<Unit>> {
        Ok(self
            .units()
            .into_iter()
            .filter(|u| u.property_id == property_id)
            .collect())
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<()> {
        self.check_writable(unit.property_id)?;
        self.state.lock().unwrap().units.push(unit.clone());
        Ok(())
    }

    async fn update_unit(&self, unit: &Unit) -> Result<()> {
        self.check_writable(unit.property_id)?;
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.units.iter_mut().find(|u| u.id == unit.id) {
            *existing = unit.clone();
        }
        Ok(())
    }

    async fn specials_for(&self, property_id: Uuid) -> Result<Vec<Special>> {
        Ok(self
            .specials()
            .into_iter()
            .filter(|s| s.property_id == property_id)
            .collect())
    }

    async fn insert_special(&self, special: &Special) -> Result<()> {
        self.check_writable(special.property_id)?;
        self.state.lock().unwrap().specials.push(special.clone());
        Ok(())
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<InMemoryPropertyStore>,
    pub ai: Arc<MockAI>,
    pub search_service: Arc<MockSearchService>,
    pub direct: Arc<MockFetchStrategy>,
    pub rendered: Arc<MockFetchStrategy>,
    pub unit_discovery: Arc<MockUnitDiscovery>,
    /// When false, deps carry no structured search (no API key configured)
    pub structured_search: bool,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryPropertyStore::new()),
            ai: Arc::new(MockAI::new()),
            search_service: Arc::new(MockSearchService::new()),
            direct: Arc::new(MockFetchStrategy::new(FetchMethod::Direct)),
            rendered: Arc::new(MockFetchStrategy::new(FetchMethod::Rendered)),
            unit_discovery: Arc::new(MockUnitDiscovery::new()),
            structured_search: true,
        }
    }

    pub fn mock_store(mut self, store: InMemoryPropertyStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    pub fn mock_search(mut self, search: MockSearchService) -> Self {
        self.search_service = Arc::new(search);
        self
    }

    pub fn mock_direct(mut self, direct: MockFetchStrategy) -> Self {
        self.direct = Arc::new(direct);
        self
    }

    pub fn mock_rendered(mut self, rendered: MockFetchStrategy) -> Self {
        self.rendered = Arc::new(rendered);
        self
    }

    pub fn mock_unit_discovery(mut self, discovery: MockUnitDiscovery) -> Self {
        self.unit_discovery = Arc::new(discovery);
        self
    }

    pub fn without_structured_search(mut self) -> Self {
        self.structured_search = false;
        self
    }

    /// Convert to ServerDeps for use in tests
    pub fn into_server_deps(&self) -> ServerDeps {
        let search_service: Option<Arc<dyn BaseSearchService>> = if self.structured_search {
            Some(self.search_service.clone())
        } else {
            None
        };
        let tiers: Vec<Arc<dyn BaseFetchStrategy>> =
            vec![self.direct.clone(), self.rendered.clone()];

        ServerDeps::new(
            self.store.clone(),
            self.ai.clone(),
            Arc::new(ContentFetcher::new(tiers)),
            search_service,
            self.unit_discovery.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
