//! Idempotent persistence of a unit-discovery result.
//!
//! Floor plans match existing rows by name (case-insensitive) and get their
//! pricing refreshed; units match by unit number within the property;
//! specials match by their first 50 characters. Nothing is ever duplicated
//! by a rerun over the same page.

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domains::properties::enrichment::types::CONFIDENCE_FLOOR;
use crate::domains::properties::models::{FloorPlan, Special, Unit};
use crate::domains::properties::units::types::{PersistSummary, UnitDiscoveryResult};
use crate::kernel::BasePropertyStore;

pub async fn persist_discovery(
    property_id: Uuid,
    result: &UnitDiscoveryResult,
    store: &dyn BasePropertyStore,
) -> Result<PersistSummary> {
    let mut summary = PersistSummary::default();

    let mut plans = store.floor_plans_for(property_id).await?;
    let mut units = store.units_for(property_id).await?;
    let mut specials = store.specials_for(property_id).await?;

    for discovered in &result.floor_plans {
        let floor_plan_id = match plans.iter_mut().find(|p| p.same_name(&discovered.name)) {
            Some(existing) => {
                existing.refresh_from(discovered);
                store.update_floor_plan(existing).await?;
                summary.floor_plans_updated += 1;
                existing.id
            }
            None => {
                let plan = FloorPlan::from_discovered(property_id, discovered);
                store.insert_floor_plan(&plan).await?;
                summary.floor_plans_created += 1;
                let id = plan.id;
                plans.push(plan);
                id
            }
        };

        for discovered_unit in &discovered.units {
            if discovered_unit.unit_number.trim().is_empty() {
                continue;
            }
            match units
                .iter_mut()
                .find(|u| u.same_number(&discovered_unit.unit_number))
            {
                Some(existing) => {
                    existing.refresh_from(Some(floor_plan_id), discovered_unit);
                    store.update_unit(existing).await?;
                    summary.units_updated += 1;
                }
                None => {
                    let unit = Unit::from_discovered(property_id, Some(floor_plan_id), discovered_unit);
                    store.insert_unit(&unit).await?;
                    summary.units_created += 1;
                    units.push(unit);
                }
            }
        }
    }

    let now = Utc::now();
    for discovered in &result.specials {
        let confident = discovered.confidence.map_or(true, |c| c >= CONFIDENCE_FLOOR);
        if !confident {
            debug!(
                property_id = %property_id,
                confidence = ?discovered.confidence,
                "Skipping low-confidence special"
            );
            summary.specials_skipped += 1;
            continue;
        }
        if specials.iter().any(|s| s.same_text(&discovered.special_text)) {
            summary.specials_skipped += 1;
            continue;
        }

        let special = Special::from_discovered(property_id, discovered, &result.source_url, now);
        store.insert_special(&special).await?;
        summary.specials_created += 1;
        specials.push(special);
    }

    info!(
        property_id = %property_id,
        floor_plans_created = summary.floor_plans_created,
        floor_plans_updated = summary.floor_plans_updated,
        units_created = summary.units_created,
        units_updated = summary.units_updated,
        specials_created = summary.specials_created,
        specials_skipped = summary.specials_skipped,
        "Persisted unit discovery"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::properties::units::types::{
        DiscoveredFloorPlan, DiscoveredSpecial, DiscoveredUnit,
    };
    use crate::kernel::test_dependencies::InMemoryPropertyStore;

    fn discovery() -> UnitDiscoveryResult {
        UnitDiscoveryResult {
            source_url: "https://oakridgeapts.com/floorplans".into(),
            floor_plans: vec![DiscoveredFloorPlan {
                name: "A1".into(),
                beds: Some(1),
                starting_at: Some(1199.0),
                units: vec![
                    DiscoveredUnit {
                        unit_number: "1204".into(),
                        rent: Some(1199.0),
                        ..Default::default()
                    },
                    DiscoveredUnit {
                        unit_number: "1310".into(),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            specials: vec![
                DiscoveredSpecial {
                    special_text: "Get 6 weeks free on select two bedroom homes when you lease by Friday".into(),
                    confidence: Some(0.9),
                    ..Default::default()
                },
                DiscoveredSpecial {
                    special_text: "Maybe a discount?".into(),
                    confidence: Some(0.4),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_run_inserts() {
        let store = InMemoryPropertyStore::new();
        let property_id = Uuid::new_v4();

        let summary = persist_discovery(property_id, &discovery(), &store).await.unwrap();

        assert_eq!(summary.floor_plans_created, 1);
        assert_eq!(summary.units_created, 2);
        assert_eq!(summary.specials_created, 1);
        assert_eq!(summary.specials_skipped, 1);

        let plan_id = store.floor_plans()[0].id;
        assert!(store.units().iter().all(|u| u.floor_plan_id == Some(plan_id)));
        assert_eq!(
            store.specials()[0].source.as_deref(),
            Some("https://oakridgeapts.com/floorplans")
        );
    }

    #[tokio::test]
    async fn test_rerun_never_duplicates() {
        let store = InMemoryPropertyStore::new();
        let property_id = Uuid::new_v4();
        persist_discovery(property_id, &discovery(), &store).await.unwrap();

        let mut second = discovery();
        second.floor_plans[0].name = "a1 ".into();
        second.floor_plans[0].starting_at = Some(1149.0);
        second.specials[0].special_text =
            "GET 6 weeks free on select two bedroom homes   when you lease by Nov 30!".into();

        let summary = persist_discovery(property_id, &second, &store).await.unwrap();

        assert_eq!(summary.floor_plans_created, 0);
        assert_eq!(summary.floor_plans_updated, 1);
        assert_eq!(summary.units_created, 0);
        assert_eq!(summary.units_updated, 2);
        assert_eq!(summary.specials_created, 0);

        assert_eq!(store.floor_plans().len(), 1);
        assert_eq!(store.floor_plans()[0].starting_at, Some(1149.0));
        assert_eq!(store.units().len(), 2);
        assert_eq!(store.specials().len(), 1);
    }
}
