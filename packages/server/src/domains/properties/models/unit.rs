use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::properties::units::types::DiscoveredUnit;

/// Unit - a single leasable apartment, linked to its floor plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub property_id: Uuid,
    pub floor_plan_id: Option<Uuid>,
    pub unit_number: String,
    pub floor: Option<i32>,
    pub rent: Option<f64>,
    pub market_rent: Option<f64>,
    pub available_from: Option<NaiveDate>,
    pub is_available: Option<bool>,
    pub status: Option<String>,
}

/// Parse a model-supplied date; anything that is not YYYY-MM-DD is dropped.
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok())
}

impl Unit {
    pub fn from_discovered(
        property_id: Uuid,
        floor_plan_id: Option<Uuid>,
        unit: &DiscoveredUnit,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            floor_plan_id,
            unit_number: unit.unit_number.trim().to_string(),
            floor: unit.floor,
            rent: unit.rent,
            market_rent: unit.market_rent,
            available_from: parse_date(unit.available_from.as_deref()),
            is_available: unit.is_available,
            status: unit.status.clone(),
        }
    }

    pub fn refresh_from(&mut self, floor_plan_id: Option<Uuid>, unit: &DiscoveredUnit) {
        self.floor_plan_id = floor_plan_id.or(self.floor_plan_id);
        self.floor = unit.floor.or(self.floor);
        self.rent = unit.rent.or(self.rent);
        self.market_rent = unit.market_rent.or(self.market_rent);
        self.available_from = parse_date(unit.available_from.as_deref()).or(self.available_from);
        self.is_available = unit.is_available.or(self.is_available);
        self.status = unit.status.clone().or_else(|| self.status.take());
    }

    pub fn same_number(&self, unit_number: &str) -> bool {
        self.unit_number
            .trim()
            .eq_ignore_ascii_case(unit_number.trim())
    }
}

// =============================================================================
// SQL Queries
// =============================================================================

impl Unit {
    pub async fn find_by_property(property_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let units = sqlx::query_as::<_, Unit>(
            "SELECT * FROM units WHERE property_id = $1 ORDER BY unit_number",
        )
        .bind(property_id)
        .fetch_all(pool)
        .await?;
        Ok(units)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO units
                (id, property_id, floor_plan_id, unit_number, floor, rent, market_rent,
                 available_from, is_available, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(self.id)
        .bind(self.property_id)
        .bind(self.floor_plan_id)
        .bind(&self.unit_number)
        .bind(self.floor)
        .bind(self.rent)
        .bind(self.market_rent)
        .bind(self.available_from)
        .bind(self.is_available)
        .bind(&self.status)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE units
            SET floor_plan_id = $2, floor = $3, rent = $4, market_rent = $5,
                available_from = $6, is_available = $7, status = $8
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(self.floor_plan_id)
        .bind(self.floor)
        .bind(self.rent)
        .bind(self.market_rent)
        .bind(self.available_from)
        .bind(self.is_available)
        .bind(&self.status)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(Some("2026-11-01")),
            NaiveDate::from_ymd_opt(2026, 11, 1)
        );
        assert_eq!(parse_date(Some("Available Now")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_refresh_keeps_known_values() {
        let property_id = Uuid::new_v4();
        let mut unit = Unit::from_discovered(
            property_id,
            None,
            &DiscoveredUnit {
                unit_number: "1204".into(),
                rent: Some(1450.0),
                floor: Some(12),
                ..Default::default()
            },
        );

        unit.refresh_from(
            None,
            &DiscoveredUnit {
                unit_number: "1204".into(),
                rent: Some(1395.0),
                ..Default::default()
            },
        );

        assert_eq!(unit.rent, Some(1395.0));
        assert_eq!(unit.floor, Some(12));
        assert!(unit.same_number(" 1204 "));
    }
}
