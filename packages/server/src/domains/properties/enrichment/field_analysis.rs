use crate::domains::properties::enrichment::types::{EnrichableField, FieldAnalysis, FieldValue};
use crate::domains::properties::models::Property;

/// Classify every enrichable field of a property snapshot.
///
/// Pure; recomputed on every run because the record may have been edited
/// since the last one.
pub fn analyze(property: &Property) -> FieldAnalysis {
    let mut analysis = FieldAnalysis::default();

    for field in EnrichableField::ALL {
        let value = property.field_value(field);

        let missing = match (&value, field) {
            (None, _) => true,
            (Some(FieldValue::Text(name)), EnrichableField::Name) => {
                is_placeholder_name(name, property.street_address.as_deref())
            }
            _ => false,
        };

        if missing {
            analysis.missing.insert(field);
            continue;
        }

        if let Some(value) = value {
            if field.is_verifiable() {
                analysis.needs_verification.insert(field);
            }
            analysis.existing.insert(field, value);
        }
    }

    analysis
}

/// A name that is really the address: equal to the street, or containing
/// the street's first comma-separated segment.
fn is_placeholder_name(name: &str, street: Option<&str>) -> bool {
    let Some(street) = street.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };

    let name = name.trim().to_lowercase();
    let street = street.to_lowercase();
    if name == street {
        return true;
    }

    let first_segment = street.split(',').next().unwrap_or_default().trim();
    !first_segment.is_empty() && name.contains(first_segment)
}
