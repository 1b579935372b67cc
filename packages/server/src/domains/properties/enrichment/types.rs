//! Typed records flowing through the enrichment pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domains::properties::error::EnrichmentError;

/// Suggestions below this confidence never reach the update set.
pub const CONFIDENCE_FLOOR: f64 = 0.6;

// =============================================================================
// Fields
// =============================================================================

/// A property column the pipeline is allowed to fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichableField {
    Name,
    ContactPhone,
    ContactEmail,
    ContactName,
    Amenities,
    LeasingLink,
    ManagementCompany,
}

/// Suggestion vocabulary that differs from the storage column name.
const FIELD_RENAMES: &[(&str, EnrichableField)] = &[
    ("property_name", EnrichableField::Name),
    ("amenities_tags", EnrichableField::Amenities),
    ("website", EnrichableField::LeasingLink),
    ("website_url", EnrichableField::LeasingLink),
    ("leasing_url", EnrichableField::LeasingLink),
    ("phone", EnrichableField::ContactPhone),
    ("email", EnrichableField::ContactEmail),
    ("management", EnrichableField::ManagementCompany),
];

impl EnrichableField {
    pub const ALL: [EnrichableField; 7] = [
        EnrichableField::Name,
        EnrichableField::ContactPhone,
        EnrichableField::ContactEmail,
        EnrichableField::ContactName,
        EnrichableField::Amenities,
        EnrichableField::LeasingLink,
        EnrichableField::ManagementCompany,
    ];

    /// Storage column name.
    pub fn column(&self) -> &'static str {
        match self {
            EnrichableField::Name => "name",
            EnrichableField::ContactPhone => "contact_phone",
            EnrichableField::ContactEmail => "contact_email",
            EnrichableField::ContactName => "contact_name",
            EnrichableField::Amenities => "amenities",
            EnrichableField::LeasingLink => "leasing_link",
            EnrichableField::ManagementCompany => "management_company",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column)
    }

    /// Map a suggestion field name to its column: exact column names first,
    /// then the rename table. `None` means the suggestion has nowhere to go.
    pub fn resolve(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::from_column(&name).or_else(|| {
            FIELD_RENAMES
                .iter()
                .find(|(alias, _)| *alias == name)
                .map(|(_, field)| *field)
        })
    }

    /// Stored as `TEXT[]`; every other field is a scalar `TEXT` column.
    pub fn is_collection(&self) -> bool {
        matches!(self, EnrichableField::Amenities)
    }

    /// Whether `value` has the shape this field's column stores.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        matches!(value, FieldValue::List(_)) == self.is_collection()
    }

    /// Fields whose stored values go stale and are re-checked every run.
    pub fn is_verifiable(&self) -> bool {
        matches!(
            self,
            EnrichableField::ContactPhone | EnrichableField::ContactEmail
        )
    }
}

impl fmt::Display for EnrichableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A field value: scalar text or a collection (amenities).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Null-equivalent for merge purposes: blank text or an empty list.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    /// Build from loosely-typed model output. Nulls, blanks, and non-string
    /// scalars yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let value = match value {
            serde_json::Value::String(s) => FieldValue::Text(s.trim().to_string()),
            serde_json::Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => return None,
        };
        (!value.is_blank()).then_some(value)
    }

    /// Reshape for `field`'s column. Text bound for a collection is split on
    /// commas, semicolons and newlines; a list bound for a scalar keeps its
    /// first entry. `None` when nothing usable is left.
    pub fn for_field(self, field: EnrichableField) -> Option<Self> {
        let value = match (self, field.is_collection()) {
            (FieldValue::Text(s), true) => FieldValue::List(
                s.split([',', ';', '\n'])
                    .map(|i| i.trim().to_string())
                    .filter(|i| !i.is_empty())
                    .collect(),
            ),
            (FieldValue::List(items), false) => {
                FieldValue::Text(items.into_iter().find(|i| !i.trim().is_empty())?)
            }
            (value, _) => value,
        };
        (!value.is_blank()).then_some(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

// =============================================================================
// Suggestions
// =============================================================================

/// Confidence in `[0, 1]`, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Result<Self, EnrichmentError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(EnrichmentError::InvalidConfidence(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn meets_floor(&self) -> bool {
        self.0 >= CONFIDENCE_FLOOR
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Confidence::new(value).map_err(serde::de::Error::custom)
    }
}

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    SearchApi,
    SearchScrape,
    PropertyWebsite,
}

impl fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionSource::SearchApi => write!(f, "search_api"),
            SuggestionSource::SearchScrape => write!(f, "search_scrape"),
            SuggestionSource::PropertyWebsite => write!(f, "property_website"),
        }
    }
}

/// A proposed value for one field. Immutable once built; the merger either
/// takes it as-is or drops it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    field: String,
    value: FieldValue,
    confidence: Confidence,
    source: SuggestionSource,
    reason: String,
}

impl Suggestion {
    pub fn new(
        field: impl Into<String>,
        value: FieldValue,
        confidence: f64,
        source: SuggestionSource,
        reason: impl Into<String>,
    ) -> Result<Self, EnrichmentError> {
        Ok(Self {
            field: field.into(),
            value,
            confidence: Confidence::new(confidence)?,
            source,
            reason: reason.into(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn source(&self) -> SuggestionSource {
        self.source
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Suggestions keyed by suggested field name.
pub type SuggestionMap = BTreeMap<String, Suggestion>;

/// Audit record of one external call, in call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source: SuggestionSource,
    pub query_or_url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_count: Option<usize>,
}

// =============================================================================
// Analysis and results
// =============================================================================

/// Classification of every enrichable field for one property snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldAnalysis {
    pub missing: BTreeSet<EnrichableField>,
    pub existing: BTreeMap<EnrichableField, FieldValue>,
    pub needs_verification: BTreeSet<EnrichableField>,
}

impl FieldAnalysis {
    /// Fields worth asking sources about: missing ones plus stale-prone ones.
    pub fn wanted(&self) -> BTreeSet<EnrichableField> {
        self.missing
            .union(&self.needs_verification)
            .copied()
            .collect()
    }
}

/// Outcome of re-checking a stored value against a fresh source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub field: EnrichableField,
    pub current_value: FieldValue,
    pub found_value: FieldValue,
    pub matches: bool,
    pub source: SuggestionSource,
}

/// Per-invocation envelope. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResult {
    pub property_id: Option<Uuid>,
    pub address_used: String,
    pub field_analysis: FieldAnalysis,
    pub suggestions: SuggestionMap,
    pub verifications: Vec<Verification>,
    pub sources_checked: Vec<SourceAttempt>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl EnrichmentResult {
    /// Wall-clock duration between the two timestamps. Can be negative if
    /// the clock moved backwards; for reporting only.
    pub fn processing_time_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    /// Website or leasing URL proposed by this run, if any.
    pub fn suggested_leasing_link(&self) -> Option<&str> {
        self.suggestions
            .values()
            .find(|s| EnrichableField::resolve(s.field()) == Some(EnrichableField::LeasingLink))
            .and_then(|s| s.value().as_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_columns_then_renames() {
        assert_eq!(EnrichableField::resolve("name"), Some(EnrichableField::Name));
        assert_eq!(
            EnrichableField::resolve("amenities_tags"),
            Some(EnrichableField::Amenities)
        );
        assert_eq!(
            EnrichableField::resolve("website_url"),
            Some(EnrichableField::LeasingLink)
        );
        assert_eq!(EnrichableField::resolve("office_hours"), None);
    }

    #[test]
    fn test_confidence_rejects_out_of_range() {
        assert!(Confidence::new(0.0).is_ok());
        assert!(Confidence::new(1.0).is_ok());
        assert!(Confidence::new(1.2).is_err());
        assert!(Confidence::new(-0.1).is_err());
        assert!(Confidence::new(f64::NAN).is_err());
    }

    #[test]
    fn test_confidence_deserialization_is_validated() {
        assert!(serde_json::from_str::<Confidence>("0.9").is_ok());
        assert!(serde_json::from_str::<Confidence>("9").is_err());
    }

    #[test]
    fn test_field_value_from_json() {
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(" (210) 555-0100 ")),
            Some(FieldValue::Text("(210) 555-0100".into()))
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(["Pool", "", "Gym"])),
            Some(FieldValue::List(vec!["Pool".into(), "Gym".into()]))
        );
        assert_eq!(FieldValue::from_json(&serde_json::json!(null)), None);
        assert_eq!(FieldValue::from_json(&serde_json::json!([])), None);
        assert_eq!(FieldValue::from_json(&serde_json::json!("  ")), None);
    }

    #[test]
    fn test_for_field_matches_column_shape() {
        assert_eq!(
            FieldValue::Text("Pool, Gym;\nDog Park".into()).for_field(EnrichableField::Amenities),
            Some(FieldValue::List(vec!["Pool".into(), "Gym".into(), "Dog Park".into()]))
        );
        assert_eq!(
            FieldValue::List(vec!["".into(), "(210) 555-0100".into(), "(210) 555-0101".into()])
                .for_field(EnrichableField::ContactPhone),
            Some(FieldValue::Text("(210) 555-0100".into()))
        );
        assert_eq!(
            FieldValue::Text(" , ".into()).for_field(EnrichableField::Amenities),
            None
        );
        assert!(EnrichableField::Amenities.accepts(&FieldValue::List(vec!["Pool".into()])));
        assert!(!EnrichableField::Amenities.accepts(&FieldValue::Text("Pool".into())));
        assert!(!EnrichableField::Name.accepts(&FieldValue::List(vec!["Oak".into()])));
    }

    #[test]
    fn test_suggestion_serializes_flat() {
        let s = Suggestion::new(
            "name",
            FieldValue::Text("Oak Ridge Apartments".into()),
            0.9,
            SuggestionSource::SearchApi,
            "Knowledge graph title",
        )
        .unwrap();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["value"], "Oak Ridge Apartments");
        assert_eq!(json["confidence"], 0.9);
        assert_eq!(json["source"], "search_api");
    }
}
