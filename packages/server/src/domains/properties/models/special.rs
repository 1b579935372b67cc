use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::unit::parse_date;
use crate::domains::properties::units::types::DiscoveredSpecial;

/// Characters compared when deciding whether a special is already stored.
pub const SPECIAL_MATCH_PREFIX: usize = 50;

/// Special - a move-in offer or concession seen on a leasing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Special {
    pub id: Uuid,
    pub property_id: Uuid,
    pub special_text: String,
    pub source: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub expires_at: Option<NaiveDate>,
    pub confidence: Option<f64>,
}

/// Lowercased, whitespace-collapsed prefix used for duplicate detection.
pub fn match_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(SPECIAL_MATCH_PREFIX)
        .collect()
}

impl Special {
    pub fn from_discovered(
        property_id: Uuid,
        special: &DiscoveredSpecial,
        source: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            special_text: special.special_text.trim().to_string(),
            source: Some(source.to_string()),
            discovered_at: at,
            expires_at: parse_date(special.expires_at.as_deref()),
            confidence: special.confidence,
        }
    }

    pub fn same_text(&self, text: &str) -> bool {
        match_key(&self.special_text) == match_key(text)
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

impl Special {
    pub async fn find_by_property(property_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let specials = sqlx::query_as::<_, Special>(
            "SELECT * FROM specials WHERE property_id = $1 ORDER BY discovered_at DESC",
        )
        .bind(property_id)
        .fetch_all(pool)
        .await?;
        Ok(specials)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO specials
                (id, property_id, special_text, source, discovered_at, expires_at, confidence)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(self.id)
        .bind(self.property_id)
        .bind(&self.special_text)
        .bind(&self.source)
        .bind(self.discovered_at)
        .bind(self.expires_at)
        .bind(self.confidence)
        .execute(pool)
        .await?;
        Ok(())
    }
}
