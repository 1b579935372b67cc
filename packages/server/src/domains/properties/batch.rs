//! Batch driver - enrich and unit-scan a selection of properties
//!
//! Properties are processed strictly one at a time, in selection order.
//! Each property advances its own lifecycle:
//!
//! - orchestrator error: `failed`
//! - non-empty merge: fields written, `enriched`
//! - empty merge or no suggestions: `reviewed`, no field writes
//! - unit discovery ran: `units_scanned_at` set, whether or not units were found
//!
//! A failure on one property is recorded in its outcome and never stops
//! the batch.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domains::properties::enrichment::merge::merge;
use crate::domains::properties::enrichment::orchestrator::{EnrichOptions, EnrichmentOrchestrator};
use crate::domains::properties::enrichment::types::EnrichableField;
use crate::domains::properties::models::{EnrichmentStatus, Property, PropertySelection};
use crate::domains::properties::units::persist::persist_discovery;
use crate::domains::properties::units::types::PersistSummary;
use crate::kernel::{BasePropertyStore, BaseUnitDiscovery};

/// Which stage a batch run targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    #[default]
    Property,
    Units,
    Both,
}

impl BatchPhase {
    fn enriches(&self) -> bool {
        matches!(self, BatchPhase::Property | BatchPhase::Both)
    }

    fn scans_units(&self) -> bool {
        matches!(self, BatchPhase::Units | BatchPhase::Both)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub phase: BatchPhase,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub force_fields: Vec<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub property_ids: Vec<Uuid>,
    /// Scrape this URL instead of searching (meant for single-property runs)
    #[serde(default)]
    pub override_url: Option<String>,
}

/// What happened to one property in a batch run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyOutcome {
    pub property_id: Uuid,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EnrichmentStatus>,
    pub suggestion_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leasing_link: Option<String>,
    pub fields_updated: Vec<EnrichableField>,
    pub units_scanned: bool,
    pub units_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<PersistSummary>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub success: bool,
    pub processed: usize,
    pub enriched: usize,
    pub units_found: usize,
    pub remaining: i64,
    pub results: Vec<PropertyOutcome>,
}

pub struct BatchDriver {
    store: Arc<dyn BasePropertyStore>,
    orchestrator: Arc<EnrichmentOrchestrator>,
    unit_discovery: Arc<dyn BaseUnitDiscovery>,
    default_limit: usize,
}

impl BatchDriver {
    pub fn new(
        store: Arc<dyn BasePropertyStore>,
        orchestrator: Arc<EnrichmentOrchestrator>,
        unit_discovery: Arc<dyn BaseUnitDiscovery>,
        default_limit: usize,
    ) -> Self {
        Self {
            store,
            orchestrator,
            unit_discovery,
            default_limit,
        }
    }

    /// Run one batch. Only selection and count queries can fail the whole run.
    pub async fn run(&self, request: &BatchRequest) -> Result<BatchReport> {
        let started = Instant::now();
        let selection = PropertySelection {
            limit: request.limit.unwrap_or(self.default_limit),
            force_update: request.force_update,
            area: request.area.clone(),
            property_ids: request.property_ids.clone(),
        };
        let options = EnrichOptions {
            override_url: request.override_url.clone(),
            force_fields: request.force_fields.iter().cloned().collect::<BTreeSet<_>>(),
        };

        let mut report = BatchReport {
            success: true,
            ..Default::default()
        };
        let mut seen = HashSet::new();

        if request.phase.enriches() {
            let properties = self.store.select_for_enrichment(&selection).await?;
            info!(phase = ?request.phase, selected = properties.len(), "Starting enrichment batch");

            for property in properties {
                seen.insert(property.id);
                let mut outcome = self.enrich_one(&property, &options).await;
                if outcome.status == Some(EnrichmentStatus::Enriched) {
                    report.enriched += 1;
                }

                if request.phase.scans_units() {
                    let stored = property.leasing_link.clone().filter(|l| !l.trim().is_empty());
                    let leasing_url = outcome.leasing_link.clone().or(stored);
                    if let Some(url) = leasing_url {
                        self.scan_units(property.id, &url, &mut outcome).await;
                    }
                }

                report.units_found += outcome.units_found;
                report.processed += 1;
                report.results.push(outcome);
            }
        }

        if request.phase.scans_units() {
            let properties = self.store.select_for_unit_scan(&selection).await?;
            let pending: Vec<Property> = properties
                .into_iter()
                .filter(|p| !seen.contains(&p.id))
                .collect();
            info!(phase = ?request.phase, selected = pending.len(), "Starting unit scan batch");

            for property in pending {
                let mut outcome = PropertyOutcome {
                    property_id: property.id,
                    name: property.name.clone(),
                    ..Default::default()
                };
                match property.leasing_link.as_deref().map(str::trim) {
                    Some(url) if !url.is_empty() => {
                        self.scan_units(property.id, url, &mut outcome).await
                    }
                    _ => outcome.errors.push("No leasing link to scan".to_string()),
                }

                report.units_found += outcome.units_found;
                report.processed += 1;
                report.results.push(outcome);
            }
        }

        report.remaining = match self.store.status_counts().await {
            Ok(counts) => match request.phase {
                BatchPhase::Property => counts.pending,
                BatchPhase::Units => counts.units_pending,
                BatchPhase::Both => counts.pending + counts.units_pending,
            },
            Err(e) => {
                warn!(error = %e, "Failed to count remaining properties");
                0
            }
        };

        info!(
            phase = ?request.phase,
            processed = report.processed,
            enriched = report.enriched,
            units_found = report.units_found,
            remaining = report.remaining,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch completed"
        );
        Ok(report)
    }

    /// Enrich, merge, persist and transition one property. Never fails.
    async fn enrich_one(&self, property: &Property, options: &EnrichOptions) -> PropertyOutcome {
        let mut outcome = PropertyOutcome {
            property_id: property.id,
            name: property.name.clone(),
            ..Default::default()
        };

        let result = match self.orchestrator.enrich(property, options).await {
            Ok(result) => result,
            Err(e) => {
                warn!(property_id = %property.id, error = %e, "Enrichment failed");
                outcome.errors.push(e.to_string());
                self.mark_failed(property.id, &mut outcome).await;
                return outcome;
            }
        };

        outcome.suggestion_count = result.suggestions.len();
        outcome.errors.extend(result.errors.iter().cloned());
        if let Some(link) = result.suggested_leasing_link() {
            outcome.leasing_link = Some(link.to_string());
        }

        let merged = merge(property, &result.suggestions, &options.force_fields);
        let (status, write) = if merged.update.is_empty() {
            let status = EnrichmentStatus::Reviewed;
            (status, self.store.set_enrichment_status(property.id, status).await)
        } else {
            let status = EnrichmentStatus::Enriched;
            let pairs = merged.update.to_pairs();
            (status, self.store.apply_enrichment(property.id, &pairs, Utc::now()).await)
        };

        match write {
            Ok(()) => {
                if status == EnrichmentStatus::Enriched {
                    outcome.fields_updated = merged.update.fields.keys().copied().collect();
                }
                outcome.status = Some(status);
                info!(
                    property_id = %property.id,
                    status = %status,
                    suggestions = outcome.suggestion_count,
                    fields_updated = outcome.fields_updated.len(),
                    dropped = merged.dropped.len(),
                    "Property processed"
                );
            }
            Err(e) => {
                error!(property_id = %property.id, error = %e, "Failed to persist enrichment");
                outcome.errors.push(format!("Persist failed: {}", e));
                self.mark_failed(property.id, &mut outcome).await;
            }
        }

        outcome
    }

    async fn mark_failed(&self, id: Uuid, outcome: &mut PropertyOutcome) {
        outcome.status = Some(EnrichmentStatus::Failed);
        if let Err(e) = self
            .store
            .set_enrichment_status(id, EnrichmentStatus::Failed)
            .await
        {
            error!(property_id = %id, error = %e, "Failed to mark property failed");
            outcome.errors.push(format!("Status update failed: {}", e));
        }
    }

    /// Discover, persist and mark scanned. Failures land in the outcome.
    async fn scan_units(&self, property_id: Uuid, leasing_url: &str, outcome: &mut PropertyOutcome) {
        let discovered = match self.unit_discovery.discover(leasing_url).await {
            Ok(discovered) => discovered,
            Err(e) => {
                warn!(property_id = %property_id, url = %leasing_url, error = %e, "Unit discovery failed");
                outcome.errors.push(format!("Unit discovery failed: {}", e));
                return;
            }
        };

        outcome.errors.extend(discovered.errors.iter().cloned());
        outcome.units_found = discovered.unit_count();

        match persist_discovery(property_id, &discovered, self.store.as_ref()).await {
            Ok(summary) => outcome.persisted = Some(summary),
            Err(e) => {
                error!(property_id = %property_id, error = %e, "Failed to persist units");
                outcome.errors.push(format!("Unit persist failed: {}", e));
                return;
            }
        }

        match self.store.mark_units_scanned(property_id, Utc::now()).await {
            Ok(()) => outcome.units_scanned = true,
            Err(e) => {
                error!(property_id = %property_id, error = %e, "Failed to mark units scanned");
                outcome.errors.push(format!("Status update failed: {}", e));
            }
        }
    }
}
