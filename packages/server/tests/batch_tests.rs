//! Batch driver: per-property state machine, isolation and idempotence.

mod common;

use common::*;
use enrichment_core::domains::properties::batch::{BatchPhase, BatchRequest};
use enrichment_core::domains::properties::enrichment::types::EnrichableField;
use enrichment_core::domains::properties::models::EnrichmentStatus;
use enrichment_core::kernel::test_dependencies::{InMemoryPropertyStore, MockAI, MockUnitDiscovery};
use enrichment_core::kernel::TestDependencies;
use serde_json::json;

fn property_batch() -> BatchRequest {
    BatchRequest {
        phase: BatchPhase::Property,
        limit: Some(10),
        ..Default::default()
    }
}

#[tokio::test]
async fn enrichment_writes_missing_fields_and_marks_enriched() {
    let property = placeholder_property("123 Main St");
    let id = property.id;
    let deps = happy_deps(InMemoryPropertyStore::new().with_property(property));

    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&property_batch())
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.enriched, 1);
    assert_eq!(report.remaining, 0);

    let stored = deps.store.property(id).unwrap();
    assert_eq!(stored.status(), EnrichmentStatus::Enriched);
    assert_eq!(stored.name.as_deref(), Some("Oak Ridge Apartments"));
    assert_eq!(stored.contact_phone.as_deref(), Some("(210) 555-0100"));
    assert_eq!(stored.leasing_link.as_deref(), Some(WEBSITE));
    assert!(stored.enriched_at.is_some());
    assert!(report.results[0].fields_updated.contains(&EnrichableField::Name));
}

#[tokio::test]
async fn existing_values_are_never_overwritten() {
    let mut property = placeholder_property("123 Main St");
    property.contact_phone = Some("(210) 555-9999".to_string());
    let id = property.id;
    let deps = happy_deps(InMemoryPropertyStore::new().with_property(property));

    deps.into_server_deps()
        .batch_driver(10)
        .run(&property_batch())
        .await
        .unwrap();

    let stored = deps.store.property(id).unwrap();
    assert_eq!(stored.name.as_deref(), Some("Oak Ridge Apartments"));
    assert_eq!(stored.contact_phone.as_deref(), Some("(210) 555-9999"));
}

#[tokio::test]
async fn forced_fields_are_overwritten() {
    let mut property = placeholder_property("123 Main St");
    property.contact_phone = Some("(210) 555-9999".to_string());
    let id = property.id;
    let deps = happy_deps(InMemoryPropertyStore::new().with_property(property));

    let request = BatchRequest {
        force_fields: vec!["contact_phone".to_string()],
        ..property_batch()
    };
    deps.into_server_deps()
        .batch_driver(10)
        .run(&request)
        .await
        .unwrap();

    let stored = deps.store.property(id).unwrap();
    assert_eq!(stored.contact_phone.as_deref(), Some("(210) 555-0100"));
}

#[tokio::test]
async fn nothing_found_marks_reviewed_without_field_writes() {
    init_tracing();
    let property = placeholder_property("123 Main St");
    let id = property.id;
    // Search finds nothing and the extractor has no answers
    let deps = TestDependencies::new()
        .mock_store(InMemoryPropertyStore::new().with_property(property))
        .mock_ai(MockAI::new());

    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&property_batch())
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.enriched, 0);
    assert_eq!(report.results[0].status, Some(EnrichmentStatus::Reviewed));
    assert!(deps.store.field_writes().is_empty());
    assert_eq!(deps.store.property(id).unwrap().status(), EnrichmentStatus::Reviewed);
}

#[tokio::test]
async fn one_failing_property_does_not_stop_the_batch() {
    let first = placeholder_property("123 Main St");
    let broken = property_without_address();
    let last = placeholder_property("456 Oak Ave");
    let broken_id = broken.id;
    let store = InMemoryPropertyStore::new()
        .with_property(first)
        .with_property(broken)
        .with_property(last);
    let deps = happy_deps(store);

    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&property_batch())
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.enriched, 2);
    assert_eq!(report.results[1].status, Some(EnrichmentStatus::Failed));
    assert!(!report.results[1].errors.is_empty());
    assert_eq!(
        deps.store.property(broken_id).unwrap().status(),
        EnrichmentStatus::Failed
    );
}

#[tokio::test]
async fn store_failure_is_isolated_to_its_property() {
    let first = placeholder_property("123 Main St");
    let second = placeholder_property("456 Oak Ave");
    let first_id = first.id;
    let second_id = second.id;
    let store = InMemoryPropertyStore::new()
        .with_property(first)
        .with_property(second);
    store.fail_writes_for(first_id);
    let deps = happy_deps(store);

    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&property_batch())
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.enriched, 1);
    assert!(report.results[0]
        .errors
        .iter()
        .any(|e| e.starts_with("Persist failed")));
    assert_eq!(
        deps.store.property(second_id).unwrap().status(),
        EnrichmentStatus::Enriched
    );
}

#[tokio::test]
async fn second_run_over_processed_properties_writes_nothing() {
    let enriched = placeholder_property("123 Main St");
    let store = InMemoryPropertyStore::new().with_property(enriched);
    let deps = happy_deps(store);
    let server_deps = deps.into_server_deps();
    let request = BatchRequest {
        phase: BatchPhase::Both,
        ..property_batch()
    };

    server_deps.batch_driver(10).run(&request).await.unwrap();
    let field_writes = deps.store.field_writes().len();
    let status_writes = deps.store.status_writes().len();
    let discovery_calls = deps.unit_discovery.calls().len();

    let report = tokio_test::assert_ok!(server_deps.batch_driver(10).run(&request).await);

    assert_eq!(report.processed, 0);
    assert_eq!(deps.store.field_writes().len(), field_writes);
    assert_eq!(deps.store.status_writes().len(), status_writes);
    assert_eq!(deps.unit_discovery.calls().len(), discovery_calls);
}

#[tokio::test]
async fn both_phase_scans_the_leasing_link_just_found() {
    let property = placeholder_property("123 Main St");
    let id = property.id;
    let deps = happy_deps(InMemoryPropertyStore::new().with_property(property));

    let request = BatchRequest {
        phase: BatchPhase::Both,
        ..property_batch()
    };
    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&request)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.units_found, 2);
    assert_eq!(deps.unit_discovery.calls(), vec![WEBSITE.to_string()]);
    assert!(deps.store.property(id).unwrap().units_scanned_at.is_some());
    assert_eq!(deps.store.floor_plans().len(), 1);
    assert_eq!(deps.store.units().len(), 2);
    assert_eq!(deps.store.specials().len(), 1);
}

#[tokio::test]
async fn units_phase_marks_scanned_even_when_nothing_found() {
    init_tracing();
    let mut property = placeholder_property("123 Main St");
    property.leasing_link = Some("https://oakridgeapts.com/floorplans".to_string());
    property.enrichment_status = Some("reviewed".to_string());
    let id = property.id;
    let deps = TestDependencies::new()
        .mock_store(InMemoryPropertyStore::new().with_property(property))
        .mock_unit_discovery(MockUnitDiscovery::new());

    let request = BatchRequest {
        phase: BatchPhase::Units,
        ..property_batch()
    };
    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&request)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.units_found, 0);
    assert!(report.results[0].units_scanned);
    assert!(deps.store.property(id).unwrap().units_scanned_at.is_some());
    assert_eq!(report.remaining, 0);
}

#[tokio::test]
async fn discovery_error_leaves_property_unscanned() {
    init_tracing();
    let mut property = placeholder_property("123 Main St");
    property.leasing_link = Some("https://oakridgeapts.com/floorplans".to_string());
    let id = property.id;
    let deps = TestDependencies::new()
        .mock_store(InMemoryPropertyStore::new().with_property(property))
        .mock_unit_discovery(MockUnitDiscovery::new().with_error("renderer unavailable"));

    let request = BatchRequest {
        phase: BatchPhase::Units,
        ..property_batch()
    };
    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&request)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert!(!report.results[0].units_scanned);
    assert!(report.results[0].errors[0].contains("renderer unavailable"));
    assert!(deps.store.property(id).unwrap().units_scanned_at.is_none());
    assert_eq!(report.remaining, 1);
}

#[tokio::test]
async fn limit_and_area_narrow_the_selection() {
    let mut austin = placeholder_property("9 Congress Ave");
    austin.city = Some("Austin".to_string());
    let store = InMemoryPropertyStore::new()
        .with_property(placeholder_property("1 First St"))
        .with_property(austin)
        .with_property(placeholder_property("2 Second St"));
    let deps = happy_deps(store);

    let request = BatchRequest {
        limit: Some(1),
        area: Some("san antonio".to_string()),
        ..property_batch()
    };
    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&request)
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.results[0].name.as_deref(), Some("1 First St"));
    assert_eq!(report.remaining, 2);
}

#[tokio::test]
async fn low_confidence_suggestions_mark_reviewed_without_field_writes() {
    init_tracing();
    let property = placeholder_property("123 Main St");
    let id = property.id;
    // No search API key: the scrape fallback and the website both answer below the floor
    let ai = MockAI::new()
        .when_prompt_contains(
            "Search results:",
            json!({
                "property_name": "Oak Ridge Apartments",
                "website_url": WEBSITE,
                "confidence": 0.4
            }),
        )
        .when_prompt_contains(
            "Page content:",
            json!({
                "extracted": {
                    "contact_phone": "(210) 555-0100",
                    "contact_email": "leasing@oakridgeapts.com"
                },
                "confidence": 0.4
            }),
        );
    let deps = TestDependencies::new()
        .mock_store(InMemoryPropertyStore::new().with_property(property))
        .mock_ai(ai)
        .mock_direct(website_page());

    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&property_batch())
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.enriched, 0);
    assert!(report.results[0].suggestion_count > 0);
    assert_eq!(report.results[0].status, Some(EnrichmentStatus::Reviewed));
    assert!(report.results[0].fields_updated.is_empty());
    assert!(deps.store.field_writes().is_empty());
    assert_eq!(deps.store.property(id).unwrap().status(), EnrichmentStatus::Reviewed);
}

#[tokio::test]
async fn amenities_answered_as_text_are_stored_as_a_list() {
    init_tracing();
    let property = placeholder_property("123 Main St");
    let id = property.id;
    let ai = MockAI::new().when_prompt_contains(
        "Page content:",
        json!({
            "extracted": {
                "property_name": "Oak Ridge Apartments",
                "contact_phone": "(210) 555-0100",
                "amenities": "Pool, Fitness Center"
            },
            "confidence": 0.9
        }),
    );
    let deps = TestDependencies::new()
        .mock_store(InMemoryPropertyStore::new().with_property(property))
        .mock_search(search_hit())
        .mock_ai(ai)
        .mock_direct(website_page());

    let report = deps
        .into_server_deps()
        .batch_driver(10)
        .run(&property_batch())
        .await
        .unwrap();

    assert_eq!(report.enriched, 1);
    assert!(report.results[0].errors.is_empty());
    let stored = deps.store.property(id).unwrap();
    assert_eq!(stored.status(), EnrichmentStatus::Enriched);
    assert_eq!(
        stored.amenities,
        Some(vec!["Pool".to_string(), "Fitness Center".to_string()])
    );
    assert_eq!(stored.contact_phone.as_deref(), Some("(210) 555-0100"));
}
