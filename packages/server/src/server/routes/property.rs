//! Property enrichment endpoints under `/api/property`.
//!
//! Nothing here writes property fields except the batch endpoint; `enrich`
//! and `deep-search` return suggestions for review.

use std::collections::BTreeSet;

use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::ServiceStatus;
use crate::domains::properties::batch::{BatchReport, BatchRequest};
use crate::domains::properties::enrichment::orchestrator::{DeepSearchRequest, EnrichOptions};
use crate::domains::properties::enrichment::types::EnrichmentResult;
use crate::domains::properties::error::EnrichmentError;
use crate::domains::properties::models::{Property, StatusCounts};
use crate::domains::properties::units::persist::persist_discovery;
use crate::domains::properties::units::types::{PersistSummary, UnitDiscoveryResult};
use crate::kernel::ServerDeps;
use crate::server::app::AppState;
use crate::server::routes::error::ApiError;

type ApiResult<T> = Result<Json<T>, ApiError>;

fn require_deps(state: &AppState) -> Result<&ServerDeps, ApiError> {
    state.deps.as_deref().ok_or_else(|| {
        ApiError::NotConfigured(
            "Enrichment is not configured: OPENAI_API_KEY and BROWSERLESS_TOKEN are required"
                .to_string(),
        )
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn overlay(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = non_blank(value) {
        *slot = Some(value);
    }
}

async fn load_property(state: &AppState, id: Uuid) -> Result<Property, ApiError> {
    state
        .store
        .find_property(id)
        .await?
        .ok_or_else(|| EnrichmentError::PropertyNotFound(id).into())
}

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub configured: bool,
    pub services: ServiceStatus,
}

pub async fn status_handler(Extension(state): Extension<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        configured: state.deps.is_some(),
        services: state.config.service_status(),
    })
}

// =============================================================================
// Single-property enrichment
// =============================================================================

/// Address parts plus whatever the caller already knows about the property.
#[derive(Debug, Default, Deserialize)]
pub struct EnrichBody {
    #[serde(default)]
    pub property_id: Option<Uuid>,
    /// Single-line address, used when `street_address` is absent
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub leasing_link: Option<String>,
    #[serde(default)]
    pub management_company: Option<String>,
    #[serde(default, alias = "overrideUrl")]
    pub override_url: Option<String>,
    #[serde(default, alias = "forceFields")]
    pub force_fields: Vec<String>,
}

impl EnrichBody {
    /// Overlay the supplied values on a stored snapshot (or a blank one).
    fn into_property(self, stored: Option<Property>) -> Property {
        let mut property = stored.unwrap_or_else(|| Property {
            id: self.property_id.unwrap_or_else(Uuid::new_v4),
            ..Default::default()
        });

        let street = non_blank(self.street_address).or_else(|| non_blank(self.address));
        overlay(&mut property.street_address, street);
        overlay(&mut property.city, self.city);
        overlay(&mut property.state, self.state);
        overlay(&mut property.zip_code, self.zip_code);
        overlay(&mut property.name, self.name);
        overlay(&mut property.contact_phone, self.contact_phone);
        overlay(&mut property.contact_email, self.contact_email);
        overlay(&mut property.contact_name, self.contact_name);
        overlay(&mut property.leasing_link, self.leasing_link);
        overlay(&mut property.management_company, self.management_company);
        if let Some(amenities) = self.amenities.filter(|a| !a.is_empty()) {
            property.amenities = Some(amenities);
        }
        property
    }
}

/// Suggestion envelope shared by enrich and deep-search
#[derive(Debug, Serialize)]
pub struct EnrichmentResponse {
    pub success: bool,
    pub suggestion_count: usize,
    pub processing_time_ms: i64,
    #[serde(flatten)]
    pub result: EnrichmentResult,
}

impl From<EnrichmentResult> for EnrichmentResponse {
    fn from(result: EnrichmentResult) -> Self {
        Self {
            success: true,
            suggestion_count: result.suggestions.len(),
            processing_time_ms: result.processing_time_ms(),
            result,
        }
    }
}

pub async fn enrich_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<EnrichBody>,
) -> ApiResult<EnrichmentResponse> {
    let deps = require_deps(&state)?;

    let stored = match body.property_id {
        Some(id) => state.store.find_property(id).await?,
        None => None,
    };
    let options = EnrichOptions {
        override_url: non_blank(body.override_url.clone()),
        force_fields: body.force_fields.iter().cloned().collect::<BTreeSet<_>>(),
    };
    let property = body.into_property(stored);

    let result = deps.orchestrator().enrich(&property, &options).await?;
    Ok(Json(result.into()))
}

// =============================================================================
// Batch
// =============================================================================

#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub success: bool,
    pub configured: bool,
    pub services: ServiceStatus,
    pub counts: StatusCounts,
}

pub async fn batch_status_handler(
    Extension(state): Extension<AppState>,
) -> ApiResult<BatchStatusResponse> {
    let counts = state.store.status_counts().await?;
    Ok(Json(BatchStatusResponse {
        success: true,
        configured: state.deps.is_some(),
        services: state.config.service_status(),
        counts,
    }))
}

pub async fn batch_enrich_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<BatchReport> {
    let deps = require_deps(&state)?;
    if request.limit == Some(0) {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }

    let report = deps
        .batch_driver(state.config.batch_default_limit)
        .run(&request)
        .await?;
    Ok(Json(report))
}

// =============================================================================
// Deep search
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DeepSearchBody {
    #[serde(default)]
    pub property_id: Option<Uuid>,
    pub url: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub address: Option<String>,
}

pub async fn deep_search_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<DeepSearchBody>,
) -> ApiResult<EnrichmentResponse> {
    let deps = require_deps(&state)?;
    let url = body.url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }

    let property = match body.property_id {
        Some(id) => Some(load_property(&state, id).await?),
        None => None,
    };
    let request = DeepSearchRequest {
        property,
        url: url.to_string(),
        fields: body.fields,
        address: non_blank(body.address),
    };

    let result = deps.orchestrator().deep_search(&request).await;
    Ok(Json(result.into()))
}

// =============================================================================
// Unit search
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct UnitSearchBody {
    #[serde(default)]
    pub property_id: Option<Uuid>,
    pub url: String,
    #[serde(default)]
    pub persist: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UnitSearchResponse {
    pub success: bool,
    pub unit_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistSummary>,
    #[serde(flatten)]
    pub result: UnitDiscoveryResult,
}

pub async fn unit_search_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<UnitSearchBody>,
) -> ApiResult<UnitSearchResponse> {
    let deps = require_deps(&state)?;
    let url = body.url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }

    let property_id = match body.property_id {
        Some(id) => Some(load_property(&state, id).await?.id),
        None => None,
    };

    let result = deps.unit_discovery.discover(url).await?;

    let persisted = match property_id {
        Some(id) if body.persist != Some(false) => {
            let summary = persist_discovery(id, &result, state.store.as_ref()).await?;
            state.store.mark_units_scanned(id, chrono::Utc::now()).await?;
            info!(property_id = %id, url = %url, "Unit search persisted");
            Some(summary)
        }
        _ => None,
    };

    Ok(Json(UnitSearchResponse {
        success: true,
        unit_count: result.unit_count(),
        persisted,
        result,
    }))
}
