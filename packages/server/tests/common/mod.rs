// Common test utilities

#![allow(dead_code)]

use enrichment_core::domains::properties::models::Property;
use enrichment_core::domains::properties::units::types::{
    DiscoveredFloorPlan, DiscoveredSpecial, DiscoveredUnit, UnitDiscoveryResult,
};
use enrichment_core::kernel::test_dependencies::{
    InMemoryPropertyStore, MockAI, MockFetchStrategy, MockSearchService, MockUnitDiscovery,
};
use enrichment_core::kernel::{FetchMethod, SearchResponse, SearchResult, TestDependencies};
use serde_json::json;
use uuid::Uuid;

pub const WEBSITE: &str = "https://oakridgeapts.com/";

/// Initialize tracing once; respects RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A pending property whose name is still its street address
pub fn placeholder_property(street: &str) -> Property {
    Property {
        id: Uuid::new_v4(),
        name: Some(street.to_string()),
        street_address: Some(street.to_string()),
        city: Some("San Antonio".to_string()),
        state: Some("TX".to_string()),
        zip_code: Some("78201".to_string()),
        ..Default::default()
    }
}

/// A property the orchestrator refuses to enrich
pub fn property_without_address() -> Property {
    Property {
        id: Uuid::new_v4(),
        name: Some("Mystery Flats".to_string()),
        city: Some("San Antonio".to_string()),
        ..Default::default()
    }
}

pub fn search_hit() -> MockSearchService {
    MockSearchService::new().with_response(SearchResponse {
        knowledge_graph: None,
        organic: vec![SearchResult {
            position: 1,
            title: "Oak Ridge Apartments | San Antonio Apartments".to_string(),
            url: WEBSITE.to_string(),
            snippet: Some("Luxury apartments in San Antonio".to_string()),
        }],
    })
}

/// Extractor answering the property-website prompt
pub fn website_ai() -> MockAI {
    MockAI::new().when_prompt_contains(
        "Page content:",
        json!({
            "extracted": {
                "property_name": "Oak Ridge Apartments",
                "contact_phone": "(210) 555-0100",
                "contact_email": "leasing@oakridgeapts.com",
                "amenities": ["Pool", "Fitness Center"]
            },
            "confidence": 0.9
        }),
    )
}

pub fn website_page() -> MockFetchStrategy {
    MockFetchStrategy::new(FetchMethod::Direct).with_content(
        &"Oak Ridge Apartments. Call (210) 555-0100 or email leasing@oakridgeapts.com. "
            .repeat(10),
    )
}

pub fn discovered_units() -> UnitDiscoveryResult {
    UnitDiscoveryResult {
        floor_plans: vec![DiscoveredFloorPlan {
            name: "A1".to_string(),
            beds: Some(1),
            baths: Some(1.0),
            starting_at: Some(1199.0),
            units: vec![
                DiscoveredUnit {
                    unit_number: "1204".to_string(),
                    rent: Some(1199.0),
                    ..Default::default()
                },
                DiscoveredUnit {
                    unit_number: "1310".to_string(),
                    rent: Some(1249.0),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        specials: vec![DiscoveredSpecial {
            special_text: "Six weeks free on select one bedroom homes with a 13 month lease".to_string(),
            confidence: Some(0.9),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Deps where search finds the property website and extraction succeeds
pub fn happy_deps(store: InMemoryPropertyStore) -> TestDependencies {
    init_tracing();
    TestDependencies::new()
        .mock_store(store)
        .mock_search(search_hit())
        .mock_ai(website_ai())
        .mock_direct(website_page())
        .mock_unit_discovery(MockUnitDiscovery::new().with_result(discovered_units()))
}
