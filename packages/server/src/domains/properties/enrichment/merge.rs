//! Non-destructive merge of suggestions into a property record.
//!
//! A suggestion is written only when its confidence meets the floor and the
//! target column is empty or explicitly forced. "Empty" is what the field
//! analyzer calls missing, so an address stored as the name counts as empty.
//! Suggestions whose field has no column are dropped and logged.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::domains::properties::enrichment::field_analysis::analyze;
use crate::domains::properties::enrichment::types::{
    EnrichableField, FieldValue, SuggestionMap, CONFIDENCE_FLOOR,
};
use crate::domains::properties::models::Property;

/// Fields to persist, keyed by storage column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyUpdate {
    pub fields: BTreeMap<EnrichableField, FieldValue>,
}

impl PropertyUpdate {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: EnrichableField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn to_pairs(&self) -> Vec<(EnrichableField, FieldValue)> {
        self.fields
            .iter()
            .map(|(field, value)| (*field, value.clone()))
            .collect()
    }
}

/// Why a suggestion did not make it into the update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    BelowConfidenceFloor,
    UnknownField,
    EmptyValue,
    HasValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedSuggestion {
    pub field: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub update: PropertyUpdate,
    pub dropped: Vec<DroppedSuggestion>,
}

/// Decide which suggestions may be written.
///
/// `force_fields` may name columns or suggestion aliases; both resolve
/// through the same rename table.
pub fn merge(
    current: &Property,
    suggestions: &SuggestionMap,
    force_fields: &BTreeSet<String>,
) -> MergeOutcome {
    let forced: BTreeSet<EnrichableField> = force_fields
        .iter()
        .filter_map(|f| EnrichableField::resolve(f))
        .collect();

    let missing = analyze(current).missing;

    let mut dropped = Vec::new();
    let mut reject = |field: &str, reason: DropReason| {
        dropped.push(DroppedSuggestion {
            field: field.to_string(),
            reason,
        })
    };

    let mut accepted = Vec::new();

    for (name, suggestion) in suggestions {
        if suggestion.confidence().value() < CONFIDENCE_FLOOR {
            debug!(
                field = %name,
                confidence = suggestion.confidence().value(),
                "Dropping suggestion below confidence floor"
            );
            reject(name, DropReason::BelowConfidenceFloor);
            continue;
        }

        let Some(field) = EnrichableField::resolve(name) else {
            warn!(field = %name, "Dropping suggestion with no storage column");
            reject(name, DropReason::UnknownField);
            continue;
        };

        let Some(value) = suggestion.value().clone().for_field(field) else {
            reject(name, DropReason::EmptyValue);
            continue;
        };

        if !forced.contains(&field) && !missing.contains(&field) {
            debug!(field = %field, "Keeping existing value");
            reject(name, DropReason::HasValue);
            continue;
        }

        accepted.push((field, suggestion.confidence().value(), value));
    }

    // Two aliases of one column: higher confidence wins
    let mut best: BTreeMap<EnrichableField, (f64, FieldValue)> = BTreeMap::new();
    for (field, confidence, value) in accepted {
        let replace = best.get(&field).map_or(true, |(c, _)| confidence > *c);
        if replace {
            best.insert(field, (confidence, value));
        }
    }

    MergeOutcome {
        update: PropertyUpdate {
            fields: best.into_iter().map(|(f, (_, v))| (f, v)).collect(),
        },
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::properties::enrichment::types::{Suggestion, SuggestionSource};

    fn suggestion(field: &str, value: &str, confidence: f64) -> (String, Suggestion) {
        (
            field.to_string(),
            Suggestion::new(
                field,
                FieldValue::Text(value.to_string()),
                confidence,
                SuggestionSource::PropertyWebsite,
                "test",
            )
            .unwrap(),
        )
    }

    fn property() -> Property {
        Property {
            name: Some("123 Main St".into()),
            street_address: Some("123 Main St".into()),
            ..Default::default()
        }
    }

    fn no_force() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_fills_empty_fields_and_placeholder_name() {
        let p = property();
        let suggestions: SuggestionMap = [
            suggestion("name", "Oak Ridge Apartments", 0.9),
            suggestion("contact_phone", "(210) 555-0100", 0.95),
        ]
        .into_iter()
        .collect();

        let outcome = merge(&p, &suggestions, &no_force());

        assert_eq!(outcome.update.len(), 2);
        assert_eq!(
            outcome.update.get(EnrichableField::Name),
            Some(&FieldValue::Text("Oak Ridge Apartments".into()))
        );
        assert_eq!(
            outcome.update.get(EnrichableField::ContactPhone),
            Some(&FieldValue::Text("(210) 555-0100".into()))
        );
    }

    #[test]
    fn test_existing_value_is_never_overwritten() {
        let mut p = property();
        p.contact_phone = Some("(210) 555-9999".into());
        let suggestions: SuggestionMap = [
            suggestion("name", "Oak Ridge Apartments", 0.9),
            suggestion("contact_phone", "(210) 555-0100", 1.0),
        ]
        .into_iter()
        .collect();

        let outcome = merge(&p, &suggestions, &no_force());

        assert_eq!(outcome.update.len(), 1);
        assert!(outcome.update.get(EnrichableField::Name).is_some());
        assert!(outcome.update.get(EnrichableField::ContactPhone).is_none());
        assert!(outcome
            .dropped
            .iter()
            .any(|d| d.field == "contact_phone" && d.reason == DropReason::HasValue));
    }

    #[test]
    fn test_confidence_floor_applies_to_empty_fields() {
        let p = property();
        let suggestions: SuggestionMap = [
            suggestion("name", "Oak Ridge Apartments", 0.59),
            suggestion("contact_email", "leasing@oakridge.com", 0.3),
        ]
        .into_iter()
        .collect();

        let outcome = merge(&p, &suggestions, &no_force());

        assert!(outcome.update.is_empty());
        assert_eq!(outcome.dropped.len(), 2);
        assert!(outcome
            .dropped
            .iter()
            .all(|d| d.reason == DropReason::BelowConfidenceFloor));
    }

    #[test]
    fn test_confidence_floor_is_inclusive() {
        let mut p = property();
        p.name = None;
        p.street_address = None;
        let suggestions: SuggestionMap =
            [suggestion("name", "Oak Ridge Apartments", 0.6)].into_iter().collect();

        assert_eq!(merge(&p, &suggestions, &no_force()).update.len(), 1);
    }

    #[test]
    fn test_forced_field_overwrites() {
        let mut p = property();
        p.contact_phone = Some("(210) 555-9999".into());
        let suggestions: SuggestionMap =
            [suggestion("contact_phone", "(210) 555-0100", 0.8)].into_iter().collect();
        let force: BTreeSet<String> = ["contact_phone".to_string()].into_iter().collect();

        let outcome = merge(&p, &suggestions, &force);

        assert_eq!(
            outcome.update.get(EnrichableField::ContactPhone),
            Some(&FieldValue::Text("(210) 555-0100".into()))
        );
    }

    #[test]
    fn test_forced_field_still_respects_floor() {
        let mut p = property();
        p.contact_phone = Some("(210) 555-9999".into());
        let suggestions: SuggestionMap =
            [suggestion("contact_phone", "(210) 555-0100", 0.5)].into_iter().collect();
        let force: BTreeSet<String> = ["contact_phone".to_string()].into_iter().collect();

        assert!(merge(&p, &suggestions, &force).update.is_empty());
    }

    #[test]
    fn test_renamed_fields_map_to_columns() {
        let p = property();
        let mut suggestions: SuggestionMap =
            [suggestion("website_url", "https://oakridgeapts.com", 0.85)]
                .into_iter()
                .collect();
        suggestions.insert(
            "amenities_tags".into(),
            Suggestion::new(
                "amenities_tags",
                FieldValue::List(vec!["Pool".into(), "Gym".into()]),
                0.8,
                SuggestionSource::PropertyWebsite,
                "test",
            )
            .unwrap(),
        );

        let outcome = merge(&p, &suggestions, &no_force());

        assert_eq!(
            outcome.update.get(EnrichableField::LeasingLink),
            Some(&FieldValue::Text("https://oakridgeapts.com".into()))
        );
        assert_eq!(
            outcome.update.get(EnrichableField::Amenities),
            Some(&FieldValue::List(vec!["Pool".into(), "Gym".into()]))
        );
    }

    #[test]
    fn test_real_name_is_kept() {
        let mut p = property();
        p.name = Some("Oak Ridge Apartments".into());
        let suggestions: SuggestionMap =
            [suggestion("name", "Oak Ridge Apts", 1.0)].into_iter().collect();

        assert!(merge(&p, &suggestions, &no_force()).update.is_empty());
    }

    #[test]
    fn test_higher_confidence_alias_wins() {
        let mut p = property();
        p.name = None;
        p.street_address = None;
        let suggestions: SuggestionMap = [
            suggestion("property_name", "Oak Ridge", 0.7),
            suggestion("name", "Oak Ridge Apartments", 0.95),
        ]
        .into_iter()
        .collect();

        let outcome = merge(&p, &suggestions, &no_force());
        assert_eq!(
            outcome.update.get(EnrichableField::Name),
            Some(&FieldValue::Text("Oak Ridge Apartments".into()))
        );
    }

    #[test]
    fn test_unknown_field_is_dropped() {
        let p = property();
        let suggestions: SuggestionMap =
            [suggestion("office_hours", "9-5", 0.9)].into_iter().collect();

        let outcome = merge(&p, &suggestions, &no_force());

        assert!(outcome.update.is_empty());
        assert_eq!(
            outcome.dropped,
            vec![DroppedSuggestion {
                field: "office_hours".into(),
                reason: DropReason::UnknownField,
            }]
        );
    }

    #[test]
    fn test_empty_collection_counts_as_empty() {
        let mut p = property();
        p.amenities = Some(vec![]);
        let suggestions: SuggestionMap = [(
            "amenities".to_string(),
            Suggestion::new(
                "amenities",
                FieldValue::List(vec!["Pool".into()]),
                0.7,
                SuggestionSource::PropertyWebsite,
                "test",
            )
            .unwrap(),
        )]
        .into_iter()
        .collect();

        assert_eq!(merge(&p, &suggestions, &no_force()).update.len(), 1);
    }

    #[test]
    fn test_values_take_the_shape_of_their_column() {
        let p = property();
        let mut suggestions: SuggestionMap = [
            suggestion("amenities", "Pool, Gym", 0.8),
            suggestion("contact_email", "leasing@oakridgeapts.com", 0.8),
        ]
        .into_iter()
        .collect();
        suggestions.insert(
            "contact_phone".into(),
            Suggestion::new(
                "contact_phone",
                FieldValue::List(vec!["(210) 555-0100".into(), "(210) 555-0199".into()]),
                0.8,
                SuggestionSource::PropertyWebsite,
                "test",
            )
            .unwrap(),
        );

        let outcome = merge(&p, &suggestions, &no_force());

        assert_eq!(
            outcome.update.get(EnrichableField::Amenities),
            Some(&FieldValue::List(vec!["Pool".into(), "Gym".into()]))
        );
        assert_eq!(
            outcome.update.get(EnrichableField::ContactPhone),
            Some(&FieldValue::Text("(210) 555-0100".into()))
        );
        for (field, value) in outcome.update.to_pairs() {
            assert!(field.accepts(&value), "{} got {:?}", field, value);
        }
    }
}
