//! Postgres-backed BasePropertyStore. Delegates to the model queries.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::properties::enrichment::types::{EnrichableField, FieldValue};
use crate::domains::properties::models::{
    EnrichmentStatus, FloorPlan, Property, PropertySelection, Special, StatusCounts, Unit,
};
use crate::kernel::BasePropertyStore;

#[derive(Clone)]
pub struct PostgresPropertyStore {
    pool: PgPool,
}

impl PostgresPropertyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BasePropertyStore for PostgresPropertyStore {
    async fn find_property(&self, id: Uuid) -> Result<Option<Property>> {
        Property::find_by_id(id, &self.pool).await
    }

    async fn select_for_enrichment(&self, selection: &PropertySelection) -> Result<Vec<Property>> {
        Property::find_for_enrichment(selection, &self.pool).await
    }

    async fn select_for_unit_scan(&self, selection: &PropertySelection) -> Result<Vec<Property>> {
        Property::find_for_unit_scan(selection, &self.pool).await
    }

    async fn apply_enrichment(
        &self,
        id: Uuid,
        fields: &[(EnrichableField, FieldValue)],
        at: DateTime<Utc>,
    ) -> Result<()> {
        Property::apply_enrichment(id, fields, at, &self.pool).await
    }

    async fn set_enrichment_status(&self, id: Uuid, status: EnrichmentStatus) -> Result<()> {
        Property::set_status(id, status, &self.pool).await
    }

    async fn mark_units_scanned(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        Property::mark_units_scanned(id, at, &self.pool).await
    }

    async fn status_counts(&self) -> Result<StatusCounts> {
        Property::status_counts(&self.pool).await
    }

    async fn floor_plans_for(&self, property_id: Uuid) -> Result<Vec<FloorPlan>> {
        FloorPlan::find_by_property(property_id, &self.pool).await
    }

    async fn insert_floor_plan(&self, plan: &FloorPlan) -> Result<()> {
        plan.insert(&self.pool).await
    }

    async fn update_floor_plan(&self, plan: &FloorPlan) -> Result<()> {
        plan.update(&self.pool).await
    }

    async fn units_for(&self, property_id: Uuid) -> Result<Vec<Unit>> {
        Unit::find_by_property(property_id, &self.pool).await
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<()> {
        unit.insert(&self.pool).await
    }

    async fn update_unit(&self, unit: &Unit) -> Result<()> {
        unit.update(&self.pool).await
    }

    async fn specials_for(&self, property_id: Uuid) -> Result<Vec<Special>> {
        Special::find_by_property(property_id, &self.pool).await
    }

    async fn insert_special(&self, special: &Special) -> Result<()> {
        special.insert(&self.pool).await
    }
}
