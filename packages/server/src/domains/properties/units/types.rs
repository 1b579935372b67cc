use serde::{Deserialize, Serialize};

use crate::kernel::FetchMethod;

/// Floor plan as read off a leasing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredFloorPlan {
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub beds: Option<i32>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub baths: Option<f64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub sqft: Option<i32>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub market_rent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub starting_at: Option<f64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub units_available: Option<i32>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub units: Vec<DiscoveredUnit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredUnit {
    #[serde(default, deserialize_with = "lenient::text")]
    pub unit_number: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub floor: Option<i32>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub rent: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub market_rent: Option<f64>,
    /// ISO date (YYYY-MM-DD) when known
    #[serde(default)]
    pub available_from: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredSpecial {
    #[serde(default, deserialize_with = "lenient::text")]
    pub special_text: String,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub confidence: Option<f64>,
}

/// What one unit-discovery run found on a leasing URL.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UnitDiscoveryResult {
    pub source_url: String,
    pub method: Option<FetchMethod>,
    pub floor_plans: Vec<DiscoveredFloorPlan>,
    pub specials: Vec<DiscoveredSpecial>,
    pub errors: Vec<String>,
}

impl UnitDiscoveryResult {
    pub fn unit_count(&self) -> usize {
        self.floor_plans.iter().map(|fp| fp.units.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.floor_plans.is_empty() && self.specials.is_empty()
    }
}

/// Row-level effect of persisting a discovery result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistSummary {
    pub floor_plans_created: usize,
    pub floor_plans_updated: usize,
    pub units_created: usize,
    pub units_updated: usize,
    pub specials_created: usize,
    pub specials_skipped: usize,
}

/// Model answers put "$1,250", "1.5 ba" or "N/A" where numbers belong.
/// These read whatever leading number is there and treat the rest as unknown.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn leading_number(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s
                    .trim()
                    .trim_start_matches('$')
                    .chars()
                    .filter(|c| *c != ',')
                    .take_while(|c| c.is_ascii_digit() || *c == '.')
                    .collect();
                cleaned.parse().ok()
            }
            _ => None,
        }
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(leading_number(&Value::deserialize(d)?))
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        Ok(leading_number(&Value::deserialize(d)?).map(|n| n.round() as i32))
    }

    /// Unit numbers arrive as strings or bare numbers. Anything else reads
    /// as blank so the one item is dropped, not the whole answer.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
    }
}
