//! Unit discovery - floor plans, units and specials from a leasing page

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::domains::properties::units::types::{
    DiscoveredFloorPlan, DiscoveredSpecial, UnitDiscoveryResult,
};
use crate::kernel::content_fetcher::ContentFetcher;
use crate::kernel::{BaseAI, BaseUnitDiscovery};

const UNIT_DISCOVERY_PROMPT: &str = r#"You are extracting floor plans, available units, and move-in specials from an apartment community's leasing page.

## Floor plans
For each floor plan return:
- name: the plan name exactly as shown (e.g. "A1", "The Magnolia")
- beds (number, 0 for studio), baths (number), sqft (number)
- market_rent: the listed market rent, starting_at: the lowest advertised price
- units_available: how many units are listed as available
- image_url: the floor plan image URL if present
- units: the individual units listed under this plan

## Units
For each unit return unit_number, floor, rent, market_rent, available_from (YYYY-MM-DD), is_available, and status (e.g. "available", "on notice").

## Specials
Move-in specials or concessions currently advertised: special_text (verbatim), expires_at (YYYY-MM-DD or null), and confidence (0 to 1) that it is a real, current offer.

## Rules
- Use null for anything not shown. NEVER invent prices, dates or unit numbers.
- Numbers must be plain numbers without currency symbols
- If the page lists no floor plans, return an empty array
- Return a single JSON object: {"floor_plans": [...], "specials": [...]}
"#;

#[derive(Debug, Default, Deserialize)]
struct UnitExtraction {
    #[serde(default)]
    floor_plans: Vec<DiscoveredFloorPlan>,
    #[serde(default)]
    specials: Vec<DiscoveredSpecial>,
}

/// BaseUnitDiscovery over the content fetcher and the extractor
pub struct UnitDiscoveryService {
    fetcher: Arc<ContentFetcher>,
    ai: Arc<dyn BaseAI>,
}

impl UnitDiscoveryService {
    pub fn new(fetcher: Arc<ContentFetcher>, ai: Arc<dyn BaseAI>) -> Self {
        Self { fetcher, ai }
    }
}

#[async_trait]
impl BaseUnitDiscovery for UnitDiscoveryService {
    /// Fetch and extraction failures come back in `errors`, not as `Err`.
    async fn discover(&self, leasing_url: &str) -> Result<UnitDiscoveryResult> {
        let started = Instant::now();
        let mut result = UnitDiscoveryResult {
            source_url: leasing_url.to_string(),
            ..Default::default()
        };

        let page = self.fetcher.fetch(leasing_url).await;
        result.method = page.method;
        if !page.success {
            let error = page.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(url = %leasing_url, error = %error, "Leasing page fetch failed");
            result.errors.push(format!("Leasing page fetch failed: {}", error));
            return Ok(result);
        }

        let user_prompt = format!(
            "Leasing page: {}\n\nPage content:\n{}",
            leasing_url, page.content
        );

        let extraction = self
            .ai
            .extract_json(UNIT_DISCOVERY_PROMPT, &user_prompt)
            .await
            .and_then(|value| {
                serde_json::from_value::<UnitExtraction>(value).map_err(anyhow::Error::from)
            });

        match extraction {
            Ok(extraction) => {
                result.floor_plans = extraction
                    .floor_plans
                    .into_iter()
                    .filter(|fp| !fp.name.trim().is_empty())
                    .map(|mut fp| {
                        fp.units.retain(|u| !u.unit_number.trim().is_empty());
                        fp
                    })
                    .collect();
                result.specials = extraction
                    .specials
                    .into_iter()
                    .filter(|s| !s.special_text.trim().is_empty())
                    .collect();
            }
            Err(e) => {
                warn!(url = %leasing_url, error = %e, "Unit extraction failed");
                result.errors.push(format!("Unit extraction failed: {}", e));
            }
        }

        info!(
            url = %leasing_url,
            method = ?result.method,
            floor_plans = result.floor_plans.len(),
            units = result.unit_count(),
            specials = result.specials.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Unit discovery completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MockAI, MockFetchStrategy};
    use crate::kernel::{BaseFetchStrategy, FetchMethod};
    use serde_json::json;

    fn service(fetch: MockFetchStrategy, ai: MockAI) -> UnitDiscoveryService {
        let tiers: Vec<Arc<dyn BaseFetchStrategy>> = vec![Arc::new(fetch)];
        UnitDiscoveryService::new(Arc::new(ContentFetcher::new(tiers)), Arc::new(ai))
    }

    #[tokio::test]
    async fn test_discovers_plans_and_specials() {
        let ai = MockAI::new().with_response(json!({
            "floor_plans": [
                {
                    "name": "A1",
                    "beds": 1,
                    "baths": 1,
                    "sqft": 725,
                    "starting_at": 1199,
                    "units": [{"unit_number": "1204", "rent": 1199, "available_from": "2026-11-01"}]
                },
                {"name": "  ", "beds": 2}
            ],
            "specials": [
                {"special_text": "6 weeks free on select homes!", "confidence": 0.9}
            ]
        }));
        let discovery = service(
            MockFetchStrategy::new(FetchMethod::Direct).with_content("Floor plans A1 from $1,199"),
            ai,
        );

        let result = discovery
            .discover("https://oakridgeapts.com/floorplans")
            .await
            .unwrap();

        assert_eq!(result.method, Some(FetchMethod::Direct));
        assert_eq!(result.floor_plans.len(), 1);
        assert_eq!(result.unit_count(), 1);
        assert_eq!(result.specials.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let ai = MockAI::new();
        let discovery = service(
            MockFetchStrategy::new(FetchMethod::Direct).with_error("HTTP 403"),
            ai,
        );

        let result = discovery
            .discover("https://oakridgeapts.com/floorplans")
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(result.errors[0].contains("HTTP 403"));
    }

    #[tokio::test]
    async fn test_malformed_extraction_is_reported() {
        let ai = MockAI::new().with_response(json!({"floor_plans": "none"}));
        let discovery = service(MockFetchStrategy::new(FetchMethod::Direct), ai);

        let result = discovery
            .discover("https://oakridgeapts.com/floorplans")
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(result.errors[0].starts_with("Unit extraction failed"));
    }

    #[tokio::test]
    async fn test_null_fields_drop_only_their_items() {
        let ai = MockAI::new().with_response(json!({
            "floor_plans": [
                {
                    "name": "A1",
                    "units": [{"unit_number": "1204", "rent": 1199}, {"unit_number": null, "rent": 1249}]
                },
                {"name": "B2", "beds": 2, "units": []},
                {"name": null, "beds": 3}
            ],
            "specials": [
                {"special_text": "Six weeks free on select homes", "confidence": 0.9},
                {"special_text": null}
            ]
        }));
        let discovery = service(MockFetchStrategy::new(FetchMethod::Direct), ai);

        let result = discovery
            .discover("https://oakridgeapts.com/floorplans")
            .await
            .unwrap();

        assert!(result.errors.is_empty());
        assert_eq!(result.floor_plans.len(), 2);
        assert_eq!(result.unit_count(), 1);
        assert_eq!(result.floor_plans[0].units[0].unit_number, "1204");
        assert_eq!(result.specials.len(), 1);
    }
}
