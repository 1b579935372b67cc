//! Enrichment orchestrator - one property through search, fetch, extract
//!
//! Stages run strictly in order. Every external failure is recovered here
//! and lands in the envelope's `errors`; the only errors returned are the
//! ones that make a run impossible (no address).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domains::properties::enrichment::extraction::{clamp_confidence, PropertyExtraction};
use crate::domains::properties::enrichment::field_analysis::analyze;
use crate::domains::properties::enrichment::prompts::{
    extractable, property_extraction_user_prompt, PROPERTY_EXTRACTION_PROMPT,
};
use crate::domains::properties::enrichment::search::SearchProvider;
use crate::domains::properties::enrichment::types::{
    EnrichableField, EnrichmentResult, FieldAnalysis, FieldValue, SourceAttempt, Suggestion,
    SuggestionMap, SuggestionSource, Verification,
};
use crate::domains::properties::error::EnrichmentError;
use crate::domains::properties::models::Property;
use crate::kernel::content_fetcher::ContentFetcher;
use crate::kernel::{BaseAI, BaseSearchService};

/// Confidence for extracted fields when the model does not report one
const DEFAULT_EXTRACTION_CONFIDENCE: f64 = 0.7;

/// Confidence for a website URL supplied by the caller
const OVERRIDE_URL_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    /// Scrape this URL as the property website instead of searching
    pub override_url: Option<String>,
    /// Fields (columns or aliases) to propose even when a value is stored
    pub force_fields: BTreeSet<String>,
}

/// Single-URL extraction of specific fields
#[derive(Debug, Clone, Default)]
pub struct DeepSearchRequest {
    pub property: Option<Property>,
    pub url: String,
    pub fields: Vec<String>,
    pub address: Option<String>,
}

pub struct EnrichmentOrchestrator {
    search: SearchProvider,
    fetcher: Arc<ContentFetcher>,
    ai: Arc<dyn BaseAI>,
}

impl EnrichmentOrchestrator {
    pub fn new(
        search_service: Option<Arc<dyn BaseSearchService>>,
        fetcher: Arc<ContentFetcher>,
        ai: Arc<dyn BaseAI>,
    ) -> Self {
        Self {
            search: SearchProvider::new(search_service, fetcher.clone(), ai.clone()),
            fetcher,
            ai,
        }
    }

    pub fn with_search_provider(mut self, search: SearchProvider) -> Self {
        self.search = search;
        self
    }

    /// Propose values for a property's missing and stale fields.
    pub async fn enrich(
        &self,
        property: &Property,
        options: &EnrichOptions,
    ) -> Result<EnrichmentResult, EnrichmentError> {
        let address = property
            .full_address()
            .ok_or(EnrichmentError::MissingAddress)?;
        let started = Instant::now();

        let analysis = analyze(property);
        let forced = resolve_fields(&options.force_fields);
        let mut wanted = analysis.wanted();
        wanted.extend(forced.iter().copied());

        let mut run = EnrichmentResult::start(Some(property.id), address.clone(), analysis);

        let website = match options.override_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                if wanted.contains(&EnrichableField::LeasingLink) {
                    run.add(
                        "website_url",
                        FieldValue::Text(url.to_string()),
                        OVERRIDE_URL_CONFIDENCE,
                        SuggestionSource::PropertyWebsite,
                        "Website URL provided by caller",
                    );
                }
                Some(url.to_string())
            }
            _ => self.search_stage(&address, &wanted, &mut run).await,
        };

        if let Some(website) = website {
            let fields = extractable(&wanted);
            self.website_stage(&website, &address, &fields, &forced, &mut run)
                .await;
        }

        run.completed_at = Utc::now();
        info!(
            property_id = %property.id,
            suggestions = run.suggestions.len(),
            verifications = run.verifications.len(),
            errors = run.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Enrichment run completed"
        );
        Ok(run)
    }

    /// Fetch one URL and extract only the requested fields. Requested fields
    /// are proposed even when the property already has a value.
    pub async fn deep_search(&self, request: &DeepSearchRequest) -> EnrichmentResult {
        let address = request
            .address
            .clone()
            .or_else(|| request.property.as_ref().and_then(|p| p.full_address()))
            .unwrap_or_default();
        let analysis = request.property.as_ref().map(analyze).unwrap_or_default();

        let requested = resolve_fields(&request.fields);
        let wanted: BTreeSet<EnrichableField> = if requested.is_empty() {
            analysis.wanted()
        } else {
            requested
        };

        let mut run = EnrichmentResult::start(
            request.property.as_ref().map(|p| p.id),
            address.clone(),
            analysis,
        );

        for name in &request.fields {
            if EnrichableField::resolve(name).is_none() {
                run.errors.push(format!("Unknown field: {}", name));
            }
        }

        let fields = extractable(&wanted);
        self.website_stage(&request.url, &address, &fields, &wanted, &mut run)
            .await;
        run.suggestions.retain(|_, s| {
            EnrichableField::resolve(s.field()).is_some_and(|f| wanted.contains(&f))
        });

        run.completed_at = Utc::now();
        run
    }

    /// Resolve name and website from the address. Returns the website to scrape.
    async fn search_stage(
        &self,
        address: &str,
        wanted: &BTreeSet<EnrichableField>,
        run: &mut EnrichmentResult,
    ) -> Option<String> {
        let outcome = self.search.resolve(address).await;
        run.sources_checked.extend(outcome.attempts);
        run.errors.extend(outcome.errors);

        let resolution = outcome.resolution;
        let source = resolution.source.unwrap_or(SuggestionSource::SearchApi);

        if let Some(name) = &resolution.property_name {
            if wanted.contains(&EnrichableField::Name) {
                run.add(
                    "name",
                    FieldValue::Text(name.clone()),
                    resolution.confidence,
                    source,
                    "Property name from search results",
                );
            }
        }

        if let Some(website) = &resolution.website_url {
            if wanted.contains(&EnrichableField::LeasingLink) {
                run.add(
                    "website_url",
                    FieldValue::Text(website.clone()),
                    resolution.confidence,
                    source,
                    "Official website from search results",
                );
            }
        }

        resolution.website_url
    }

    /// Fetch the property website and extract the requested fields.
    async fn website_stage(
        &self,
        url: &str,
        address: &str,
        fields: &[EnrichableField],
        forced: &BTreeSet<EnrichableField>,
        run: &mut EnrichmentResult,
    ) {
        let needs_verification = !run.field_analysis.needs_verification.is_empty();
        if fields.is_empty() && !needs_verification {
            return;
        }

        let page = self.fetcher.fetch(url).await;
        run.sources_checked.push(SourceAttempt {
            source: SuggestionSource::PropertyWebsite,
            query_or_url: url.to_string(),
            success: page.success,
            result_count: None,
        });

        if !page.success {
            let error = page.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(url = %url, error = %error, "Property website fetch failed");
            run.errors.push(format!("Website fetch failed: {}", error));
            return;
        }

        if fields.is_empty() {
            return;
        }

        let user_prompt = property_extraction_user_prompt(address, url, fields, &page.content);
        let extraction = match self
            .ai
            .extract_json(PROPERTY_EXTRACTION_PROMPT, &user_prompt)
            .await
            .and_then(PropertyExtraction::from_value)
        {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(url = %url, error = %e, "Property extraction failed");
                run.errors.push(format!("Property extraction failed: {}", e));
                return;
            }
        };

        let confidence = clamp_confidence(extraction.confidence, DEFAULT_EXTRACTION_CONFIDENCE);
        let reason = format!("Extracted from {}", url);

        for (key, found) in extraction.values() {
            let Some(field) = EnrichableField::resolve(&key) else {
                // No column; carried so the merge step can log and drop it
                run.add(&key, found, confidence, SuggestionSource::PropertyWebsite, &reason);
                continue;
            };

            if run.field_analysis.needs_verification.contains(&field) {
                if let Some(current) = run.field_analysis.existing.get(&field).cloned() {
                    let matches = values_match(field, &current, &found);
                    run.verifications.push(Verification {
                        field,
                        current_value: current,
                        found_value: found.clone(),
                        matches,
                        source: SuggestionSource::PropertyWebsite,
                    });
                    if !matches {
                        run.add(&key, found, confidence, SuggestionSource::PropertyWebsite, &reason);
                    }
                    continue;
                }
            }

            if run.field_analysis.missing.contains(&field) || forced.contains(&field) {
                run.add(&key, found, confidence, SuggestionSource::PropertyWebsite, &reason);
            }
        }
    }
}

impl EnrichmentResult {
    fn start(property_id: Option<Uuid>, address_used: String, field_analysis: FieldAnalysis) -> Self {
        let now = Utc::now();
        Self {
            property_id,
            address_used,
            field_analysis,
            suggestions: SuggestionMap::new(),
            verifications: Vec::new(),
            sources_checked: Vec::new(),
            errors: Vec::new(),
            started_at: now,
            completed_at: now,
        }
    }

    /// Record a suggestion. When another suggestion already targets the same
    /// column, the higher confidence one is kept.
    fn add(
        &mut self,
        name: &str,
        value: FieldValue,
        confidence: f64,
        source: SuggestionSource,
        reason: &str,
    ) {
        let suggestion = match Suggestion::new(name, value, confidence, source, reason) {
            Ok(s) => s,
            Err(e) => {
                self.errors.push(format!("Discarded suggestion for {}: {}", name, e));
                return;
            }
        };

        if let Some(field) = EnrichableField::resolve(name) {
            let rival = self
                .suggestions
                .iter()
                .find(|(_, s)| EnrichableField::resolve(s.field()) == Some(field))
                .map(|(k, s)| (k.clone(), s.confidence()));
            if let Some((rival_key, rival_confidence)) = rival {
                if rival_confidence >= suggestion.confidence() {
                    return;
                }
                self.suggestions.remove(&rival_key);
            }
        }

        self.suggestions.insert(name.to_string(), suggestion);
    }
}

fn resolve_fields<'a, I>(names: I) -> BTreeSet<EnrichableField>
where
    I: IntoIterator<Item = &'a String>,
{
    names
        .into_iter()
        .filter_map(|n| EnrichableField::resolve(n))
        .collect()
}

/// Phone numbers compare by digits (ignoring a leading country code 1),
/// emails and other text case-insensitively.
pub fn values_match(field: EnrichableField, current: &FieldValue, found: &FieldValue) -> bool {
    let (Some(current), Some(found)) = (current.as_text(), found.as_text()) else {
        return current == found;
    };

    match field {
        EnrichableField::ContactPhone => phone_digits(current) == phone_digits(found),
        _ => current.trim().eq_ignore_ascii_case(found.trim()),
    }
}

fn phone_digits(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('1') {
        Some(rest) if digits.len() == 11 => rest.to_string(),
        _ => digits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MockAI, MockFetchStrategy, MockSearchService};
    use crate::kernel::{BaseFetchStrategy, FetchMethod, SearchResponse, SearchResult};
    use serde_json::json;

    fn property() -> Property {
        Property {
            id: Uuid::new_v4(),
            name: Some("123 Main St".into()),
            street_address: Some("123 Main St".into()),
            city: Some("San Antonio".into()),
            state: Some("TX".into()),
            zip_code: Some("78201".into()),
            ..Default::default()
        }
    }

    fn search_hit() -> MockSearchService {
        MockSearchService::new().with_response(SearchResponse {
            knowledge_graph: None,
            organic: vec![SearchResult {
                position: 1,
                title: "Oak Ridge Apartments | San Antonio Apartments".into(),
                url: "https://oakridgeapts.com/".into(),
                snippet: None,
            }],
        })
    }

    fn website_ai() -> MockAI {
        MockAI::new().when_prompt_contains(
            "Page content:",
            json!({
                "extracted": {
                    "property_name": "Oak Ridge Apartments",
                    "contact_phone": "210.555.0100",
                    "contact_email": "Leasing@OakRidgeApts.com",
                    "amenities": ["Pool", "Fitness Center"],
                    "management_company": null,
                    "office_hours": "Mon-Fri 9-6"
                },
                "confidence": 0.85
            }),
        )
    }

    fn orchestrator(
        search: Option<MockSearchService>,
        ai: MockAI,
    ) -> (EnrichmentOrchestrator, Arc<MockFetchStrategy>, Arc<MockAI>) {
        let direct = Arc::new(
            MockFetchStrategy::new(FetchMethod::Direct)
                .with_content(&"Oak Ridge Apartments. Call 210.555.0100. ".repeat(20)),
        );
        let tiers: Vec<Arc<dyn BaseFetchStrategy>> = vec![direct.clone()];
        let ai = Arc::new(ai);
        let search: Option<Arc<dyn BaseSearchService>> =
            search.map(|s| Arc::new(s) as Arc<dyn BaseSearchService>);
        let orchestrator =
            EnrichmentOrchestrator::new(search, Arc::new(ContentFetcher::new(tiers)), ai.clone());
        (orchestrator, direct, ai)
    }

    #[tokio::test]
    async fn test_full_pipeline_produces_suggestions() {
        let (orchestrator, direct, _) = orchestrator(Some(search_hit()), website_ai());

        let result = orchestrator
            .enrich(&property(), &EnrichOptions::default())
            .await
            .unwrap();

        assert_eq!(result.address_used, "123 Main St, San Antonio, TX 78201");
        assert_eq!(direct.calls(), vec!["https://oakridgeapts.com/".to_string()]);

        // Search name (0.85) ties with extraction (0.85): first one stays
        let name = result.suggestions.get("name").unwrap();
        assert_eq!(name.value(), &FieldValue::Text("Oak Ridge Apartments".into()));
        assert_eq!(name.source(), SuggestionSource::SearchApi);
        assert!(!result.suggestions.contains_key("property_name"));

        assert!(result.suggestions.contains_key("website_url"));
        assert!(result.suggestions.contains_key("contact_phone"));
        assert!(result.suggestions.contains_key("amenities"));
        assert!(result.suggestions.contains_key("office_hours"));
        assert!(!result.suggestions.contains_key("management_company"));

        let sources: Vec<SuggestionSource> =
            result.sources_checked.iter().map(|s| s.source).collect();
        assert_eq!(
            sources,
            vec![SuggestionSource::SearchApi, SuggestionSource::PropertyWebsite]
        );
        assert!(result.errors.is_empty());
        assert!(result.processing_time_ms() >= 0);
    }

    #[tokio::test]
    async fn test_missing_address_is_an_error() {
        let (orchestrator, _, _) = orchestrator(Some(search_hit()), website_ai());
        let mut p = property();
        p.street_address = None;

        let err = orchestrator
            .enrich(&p, &EnrichOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingAddress));
    }

    #[tokio::test]
    async fn test_verification_of_existing_contacts() {
        let (orchestrator, _, _) = orchestrator(Some(search_hit()), website_ai());
        let mut p = property();
        p.contact_phone = Some("(210) 555-0100".into());
        p.contact_email = Some("old@oakridgeapts.com".into());

        let result = orchestrator.enrich(&p, &EnrichOptions::default()).await.unwrap();

        let phone = result
            .verifications
            .iter()
            .find(|v| v.field == EnrichableField::ContactPhone)
            .unwrap();
        assert!(phone.matches);
        assert!(!result.suggestions.contains_key("contact_phone"));

        let email = result
            .verifications
            .iter()
            .find(|v| v.field == EnrichableField::ContactEmail)
            .unwrap();
        assert!(!email.matches);
        assert!(result.suggestions.contains_key("contact_email"));
    }

    #[tokio::test]
    async fn test_override_url_skips_search() {
        let search = search_hit();
        let (orchestrator, direct, _) = orchestrator(Some(search), website_ai());
        let options = EnrichOptions {
            override_url: Some("https://liveatoakridge.com".into()),
            ..Default::default()
        };

        let result = orchestrator.enrich(&property(), &options).await.unwrap();

        assert_eq!(direct.calls(), vec!["https://liveatoakridge.com".to_string()]);
        assert!(result
            .sources_checked
            .iter()
            .all(|s| s.source == SuggestionSource::PropertyWebsite));
        assert_eq!(
            result.suggestions.get("website_url").unwrap().value(),
            &FieldValue::Text("https://liveatoakridge.com".into())
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_degrades_to_errors() {
        let ai = MockAI::new().failing_when_prompt_contains("Page content:", "HTTP 500");
        let (orchestrator, _, _) = orchestrator(Some(search_hit()), ai);

        let result = orchestrator
            .enrich(&property(), &EnrichOptions::default())
            .await
            .unwrap();

        // Search suggestions survive
        assert!(result.suggestions.contains_key("name"));
        assert!(result
            .errors
            .iter()
            .any(|e| e.starts_with("Property extraction failed")));
    }

    #[tokio::test]
    async fn test_existing_fields_not_proposed_unless_forced() {
        let (orchestrator, _, _) = orchestrator(Some(search_hit()), website_ai());
        let mut p = property();
        p.amenities = Some(vec!["Gated".into()]);

        let result = orchestrator.enrich(&p, &EnrichOptions::default()).await.unwrap();
        assert!(!result.suggestions.contains_key("amenities"));

        let options = EnrichOptions {
            force_fields: ["amenities".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let result = orchestrator.enrich(&p, &options).await.unwrap();
        assert!(result.suggestions.contains_key("amenities"));
    }

    #[tokio::test]
    async fn test_deep_search_only_requested_fields() {
        let (orchestrator, _, ai) = orchestrator(None, website_ai());
        let request = DeepSearchRequest {
            property: None,
            url: "https://oakridgeapts.com/contact".into(),
            fields: vec!["contact_phone".into(), "bogus".into()],
            address: Some("123 Main St, San Antonio, TX".into()),
        };

        let result = orchestrator.deep_search(&request).await;

        assert!(ai.was_called_with("Fields to extract: contact_phone\n"));
        assert_eq!(result.suggestions.len(), 1);
        assert!(result.suggestions.contains_key("contact_phone"));
        assert_eq!(result.errors, vec!["Unknown field: bogus".to_string()]);
    }

    #[test]
    fn test_values_match() {
        let text = |s: &str| FieldValue::Text(s.into());
        assert!(values_match(
            EnrichableField::ContactPhone,
            &text("(210) 555-0100"),
            &text("+1 210.555.0100")
        ));
        assert!(!values_match(
            EnrichableField::ContactPhone,
            &text("(210) 555-0100"),
            &text("(210) 555-9999")
        ));
        assert!(values_match(
            EnrichableField::ContactEmail,
            &text("Leasing@OakRidge.com"),
            &text("leasing@oakridge.com ")
        ));
    }
}
