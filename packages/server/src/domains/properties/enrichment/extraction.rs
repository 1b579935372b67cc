//! Typed views of the extractor's JSON answers.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domains::properties::enrichment::types::FieldValue;

/// Answer to the search-results prompt
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchExtraction {
    #[serde(default)]
    pub property_name: Option<String>,
    #[serde(default, alias = "website")]
    pub website_url: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl SearchExtraction {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("Search extraction did not match expected shape")
    }
}

/// Answer to the property-website prompt
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PropertyExtraction {
    #[serde(default)]
    pub extracted: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl PropertyExtraction {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("Property extraction did not match expected shape")
    }

    /// Non-null values by the name the model used, in key order. Keys the
    /// pipeline has no column for are kept; the merger decides their fate.
    pub fn values(&self) -> Vec<(String, FieldValue)> {
        let mut values: Vec<(String, FieldValue)> = self
            .extracted
            .iter()
            .filter_map(|(key, value)| FieldValue::from_json(value).map(|v| (key.clone(), v)))
            .collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    }
}

/// Model-reported confidence forced into `[0, 1]`; absent or NaN becomes
/// `default`.
pub fn clamp_confidence(reported: Option<f64>, default: f64) -> f64 {
    match reported {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => default,
    }
}
