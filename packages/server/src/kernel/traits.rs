// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (merge policy, field analysis, search ranking) lives in
// domain functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseSearchService)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::properties::enrichment::types::{EnrichableField, FieldValue};
use crate::domains::properties::models::{
    EnrichmentStatus, FloorPlan, Property, PropertySelection, Special, StatusCounts, Unit,
};
use crate::domains::properties::units::types::UnitDiscoveryResult;

// =============================================================================
// Search Service Trait (Infrastructure - structured web search)
// =============================================================================

/// Direct-answer panel some search APIs return for a named place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub title: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
}

/// One ranked organic result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub position: usize,
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub knowledge_graph: Option<KnowledgeGraph>,
    pub organic: Vec<SearchResult>,
}

impl SearchResponse {
    pub fn result_count(&self) -> usize {
        self.organic.len() + usize::from(self.knowledge_graph.is_some())
    }
}

#[async_trait]
pub trait BaseSearchService: Send + Sync {
    /// Run one query and return the ranked results
    async fn search(&self, query: &str) -> Result<SearchResponse>;
}

// =============================================================================
// Fetch Strategy Trait (Infrastructure - one retrieval tier)
// =============================================================================

/// How page content was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    Direct,
    Rendered,
}

impl std::fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMethod::Direct => write!(f, "direct"),
            FetchMethod::Rendered => write!(f, "rendered"),
        }
    }
}

/// Text content of one page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: String,
    pub method: FetchMethod,
}

#[async_trait]
pub trait BaseFetchStrategy: Send + Sync {
    fn method(&self) -> FetchMethod;

    /// Retrieve visible text for a URL. Errors are transport/HTTP failures.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

// =============================================================================
// AI Trait (Infrastructure - JSON extraction)
// =============================================================================

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// One low-temperature completion that must answer with a JSON object
    async fn extract_json(&self, system_prompt: &str, user_prompt: &str)
        -> Result<serde_json::Value>;
}

// =============================================================================
// Property Store Trait (Infrastructure - persistence of the CRM rows)
// =============================================================================

#[async_trait]
pub trait BasePropertyStore: Send + Sync {
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>>;

    async fn select_for_enrichment(&self, selection: &PropertySelection) -> Result<Vec<Property>>;

    async fn select_for_unit_scan(&self, selection: &PropertySelection) -> Result<Vec<Property>>;

    /// Write the merged fields plus `enriched` status and timestamp
    async fn apply_enrichment(
        &self,
        id: Uuid,
        fields: &[(EnrichableField, FieldValue)],
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Status-only transition (reviewed / failed)
    async fn set_enrichment_status(&self, id: Uuid, status: EnrichmentStatus) -> Result<()>;

    async fn mark_units_scanned(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn status_counts(&self) -> Result<StatusCounts>;

    async fn floor_plans_for(&self, property_id: Uuid) -> Result<Vec<FloorPlan>>;
    async fn insert_floor_plan(&self, plan: &FloorPlan) -> Result<()>;
    async fn update_floor_plan(&self, plan: &FloorPlan) -> Result<()>;

    async fn units_for(&self, property_id: Uuid) -> Result<Vec<Unit>>;
    async fn insert_unit(&self, unit: &Unit) -> Result<()>;
    async fn update_unit(&self, unit: &Unit) -> Result<()>;

    async fn specials_for(&self, property_id: Uuid) -> Result<Vec<Special>>;
    async fn insert_special(&self, special: &Special) -> Result<()>;
}

// =============================================================================
// Unit Discovery Trait (floor plans / units / specials from a leasing page)
// =============================================================================

#[async_trait]
pub trait BaseUnitDiscovery: Send + Sync {
    async fn discover(&self, leasing_url: &str) -> Result<UnitDiscoveryResult>;
}
