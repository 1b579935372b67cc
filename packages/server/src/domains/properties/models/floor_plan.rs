use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::properties::units::types::DiscoveredFloorPlan;

/// FloorPlan - a layout offered by a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FloorPlan {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub beds: Option<i32>,
    pub baths: Option<f64>,
    pub sqft: Option<i32>,
    pub market_rent: Option<f64>,
    pub starting_at: Option<f64>,
    pub units_available: Option<i32>,
    pub image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl FloorPlan {
    /// Build a new row from a discovered plan.
    pub fn from_discovered(property_id: Uuid, plan: &DiscoveredFloorPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            name: plan.name.trim().to_string(),
            beds: plan.beds,
            baths: plan.baths,
            sqft: plan.sqft,
            market_rent: plan.market_rent,
            starting_at: plan.starting_at,
            units_available: plan.units_available,
            image_url: plan.image_url.clone(),
            created_at: Some(Utc::now()),
        }
    }

    /// Refresh pricing/availability from a newer sighting, keeping stored
    /// values where the new one is unknown.
    pub fn refresh_from(&mut self, plan: &DiscoveredFloorPlan) {
        self.beds = plan.beds.or(self.beds);
        self.baths = plan.baths.or(self.baths);
        self.sqft = plan.sqft.or(self.sqft);
        self.market_rent = plan.market_rent.or(self.market_rent);
        self.starting_at = plan.starting_at.or(self.starting_at);
        self.units_available = plan.units_available.or(self.units_available);
        self.image_url = plan.image_url.clone().or_else(|| self.image_url.take());
    }

    /// Name match used to avoid duplicate rows.
    pub fn same_name(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

impl FloorPlan {
    pub async fn find_by_property(property_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let plans = sqlx::query_as::<_, FloorPlan>(
            "SELECT * FROM floor_plans WHERE property_id = $1 ORDER BY created_at",
        )
        .bind(property_id)
        .fetch_all(pool)
        .await?;
        Ok(plans)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO floor_plans
                (id, property_id, name, beds, baths, sqft, market_rent, starting_at,
                 units_available, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(self.id)
        .bind(self.property_id)
        .bind(&self.name)
        .bind(self.beds)
        .bind(self.baths)
        .bind(self.sqft)
        .bind(self.market_rent)
        .bind(self.starting_at)
        .bind(self.units_available)
        .bind(&self.image_url)
        .bind(self.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE floor_plans
            SET beds = $2, baths = $3, sqft = $4, market_rent = $5, starting_at = $6,
                units_available = $7, image_url = $8
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.beds)
        .bind(self.baths)
        .bind(self.sqft)
        .bind(self.market_rent)
        .bind(self.starting_at)
        .bind(self.units_available)
        .bind(&self.image_url)
        .execute(pool)
        .await?;
        Ok(())
    }
}
