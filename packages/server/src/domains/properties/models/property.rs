use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domains::properties::enrichment::types::{EnrichableField, FieldValue};

/// Property - the subject of enrichment
///
/// Only the columns this pipeline reads or writes are mapped; the rest of
/// the row belongs to the CRM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub id: Uuid,
    pub name: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,

    // Enrichable contact fields
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
    pub amenities: Option<Vec<String>>,
    pub leasing_link: Option<String>,
    pub management_company: Option<String>,

    // Lifecycle
    pub enrichment_status: Option<String>, // 'pending', 'enriched', 'reviewed', 'failed'
    pub enriched_at: Option<DateTime<Utc>>,
    pub units_scanned_at: Option<DateTime<Utc>>,

    pub created_at: Option<DateTime<Utc>>,
}

/// Enrichment lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Pending,
    Enriched,
    Reviewed,
    Failed,
}

impl std::fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentStatus::Pending => write!(f, "pending"),
            EnrichmentStatus::Enriched => write!(f, "enriched"),
            EnrichmentStatus::Reviewed => write!(f, "reviewed"),
            EnrichmentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for EnrichmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(EnrichmentStatus::Pending),
            "enriched" => Ok(EnrichmentStatus::Enriched),
            "reviewed" => Ok(EnrichmentStatus::Reviewed),
            "failed" => Ok(EnrichmentStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid enrichment status: {}", s)),
        }
    }
}

/// Which properties a batch run picks up
#[derive(Debug, Clone, Default)]
pub struct PropertySelection {
    pub limit: usize,
    pub force_update: bool,
    pub area: Option<String>,
    pub property_ids: Vec<Uuid>,
}

impl PropertySelection {
    /// Whether `property` would be picked for the property-field phase.
    pub fn matches_enrichment(&self, property: &Property) -> bool {
        if !self.property_ids.is_empty() {
            return self.property_ids.contains(&property.id) && self.matches_area(property);
        }
        (self.force_update || property.status() == EnrichmentStatus::Pending)
            && self.matches_area(property)
    }

    /// Whether `property` would be picked for the unit-discovery phase.
    pub fn matches_unit_scan(&self, property: &Property) -> bool {
        if !self.property_ids.is_empty() {
            return self.property_ids.contains(&property.id) && self.matches_area(property);
        }
        property.has_leasing_link()
            && (self.force_update || property.units_scanned_at.is_none())
            && self.matches_area(property)
    }

    fn matches_area(&self, property: &Property) -> bool {
        match (&self.area, &property.city) {
            (None, _) => true,
            (Some(area), Some(city)) => area.eq_ignore_ascii_case(city),
            (Some(_), None) => false,
        }
    }
}

/// Per-status counts for the batch status endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub pending: i64,
    pub enriched: i64,
    pub reviewed: i64,
    pub failed: i64,
    pub units_scanned: i64,
    pub units_pending: i64,
}

impl Property {
    /// Lifecycle status; a missing or unknown value counts as pending.
    pub fn status(&self) -> EnrichmentStatus {
        self.enrichment_status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(EnrichmentStatus::Pending)
    }

    /// "street, city, ST zip" from whatever parts are present.
    pub fn full_address(&self) -> Option<String> {
        let state_zip = [self.state.as_deref(), self.zip_code.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let parts: Vec<String> = [
            self.street_address.clone(),
            self.city.clone(),
            Some(state_zip),
        ]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

        let has_street = self
            .street_address
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        (has_street && !parts.is_empty()).then(|| parts.join(", "))
    }

    pub fn has_leasing_link(&self) -> bool {
        self.leasing_link
            .as_deref()
            .is_some_and(|l| !l.trim().is_empty())
    }

    /// Current stored value of an enrichable field (blank counts as absent).
    pub fn field_value(&self, field: EnrichableField) -> Option<FieldValue> {
        let value = match field {
            EnrichableField::Name => self.name.clone().map(FieldValue::Text),
            EnrichableField::ContactPhone => self.contact_phone.clone().map(FieldValue::Text),
            EnrichableField::ContactEmail => self.contact_email.clone().map(FieldValue::Text),
            EnrichableField::ContactName => self.contact_name.clone().map(FieldValue::Text),
            EnrichableField::Amenities => self.amenities.clone().map(FieldValue::List),
            EnrichableField::LeasingLink => self.leasing_link.clone().map(FieldValue::Text),
            EnrichableField::ManagementCompany => {
                self.management_company.clone().map(FieldValue::Text)
            }
        };
        value.filter(|v| !v.is_blank())
    }

    /// Write a value into the in-memory view (used by non-SQL stores).
    /// Rejects a value whose shape the column cannot hold, as Postgres would.
    pub fn set_field_value(&mut self, field: EnrichableField, value: FieldValue) -> Result<()> {
        ensure_shape(field, &value)?;
        let slot = match field {
            EnrichableField::Name => &mut self.name,
            EnrichableField::ContactPhone => &mut self.contact_phone,
            EnrichableField::ContactEmail => &mut self.contact_email,
            EnrichableField::ContactName => &mut self.contact_name,
            EnrichableField::LeasingLink => &mut self.leasing_link,
            EnrichableField::ManagementCompany => &mut self.management_company,
            EnrichableField::Amenities => {
                if let FieldValue::List(items) = value {
                    self.amenities = Some(items);
                }
                return Ok(());
            }
        };
        if let FieldValue::Text(text) = value {
            *slot = Some(text);
        }
        Ok(())
    }
}

/// Fail before any write when a value does not fit its column.
pub fn ensure_shape(field: EnrichableField, value: &FieldValue) -> Result<()> {
    anyhow::ensure!(
        field.accepts(value),
        "column {} cannot store {:?}",
        field.column(),
        value
    );
    Ok(())
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

const PROPERTY_COLUMNS: &str = "id, name, street_address, city, state, zip_code, \
    contact_phone, contact_email, contact_name, amenities, leasing_link, management_company, \
    enrichment_status, enriched_at, units_scanned_at, created_at";

impl Property {
    /// Find property by ID
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let property = sqlx::query_as::<_, Property>(&format!(
            "SELECT {} FROM properties WHERE id = $1",
            PROPERTY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(property)
    }

    /// Properties due for the property-field phase, in stable order
    pub async fn find_for_enrichment(
        selection: &PropertySelection,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM properties WHERE 1 = 1",
            PROPERTY_COLUMNS
        ));

        if !selection.property_ids.is_empty() {
            qb.push(" AND id = ANY(")
                .push_bind(selection.property_ids.clone())
                .push(")");
        } else if !selection.force_update {
            qb.push(" AND (enrichment_status IS NULL OR enrichment_status = 'pending')");
        }
        Self::push_area_and_limit(&mut qb, selection);

        let properties = qb.build_query_as::<Property>().fetch_all(pool).await?;
        Ok(properties)
    }

    /// Properties with a leasing link that have not had unit discovery yet
    pub async fn find_for_unit_scan(
        selection: &PropertySelection,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM properties WHERE 1 = 1",
            PROPERTY_COLUMNS
        ));

        if !selection.property_ids.is_empty() {
            qb.push(" AND id = ANY(")
                .push_bind(selection.property_ids.clone())
                .push(")");
        } else {
            qb.push(" AND leasing_link IS NOT NULL AND leasing_link <> ''");
            if !selection.force_update {
                qb.push(" AND units_scanned_at IS NULL");
            }
        }
        Self::push_area_and_limit(&mut qb, selection);

        let properties = qb.build_query_as::<Property>().fetch_all(pool).await?;
        Ok(properties)
    }

    fn push_area_and_limit(qb: &mut QueryBuilder<Postgres>, selection: &PropertySelection) {
        if let Some(area) = &selection.area {
            qb.push(" AND city ILIKE ").push_bind(area.clone());
        }
        qb.push(" ORDER BY created_at NULLS LAST, id LIMIT ")
            .push_bind(selection.limit as i64);
    }

    /// Write merged fields and mark the property enriched, in one statement
    pub async fn apply_enrichment(
        id: Uuid,
        fields: &[(EnrichableField, FieldValue)],
        at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<()> {
        for (field, value) in fields {
            ensure_shape(*field, value)?;
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE properties SET ");
        {
            let mut set = qb.separated(", ");
            for (field, value) in fields {
                set.push(format!("{} = ", field.column()));
                match value {
                    FieldValue::Text(text) => set.push_bind_unseparated(text.clone()),
                    FieldValue::List(items) => set.push_bind_unseparated(items.clone()),
                };
            }
            set.push("enrichment_status = ");
            set.push_bind_unseparated(EnrichmentStatus::Enriched.to_string());
            set.push("enriched_at = ");
            set.push_bind_unseparated(at);
        }
        qb.push(" WHERE id = ").push_bind(id);

        qb.build().execute(pool).await?;
        Ok(())
    }

    /// Status-only transition; no enrichable field is touched
    pub async fn set_status(id: Uuid, status: EnrichmentStatus, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE properties SET enrichment_status = $1 WHERE id = $2")
            .bind(status.to_string())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_units_scanned(id: Uuid, at: DateTime<Utc>, pool: &PgPool) -> Result<()> {
        sqlx::query("UPDATE properties SET units_scanned_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn status_counts(pool: &PgPool) -> Result<StatusCounts> {
        let counts = sqlx::query_as::<_, StatusCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE enrichment_status IS NULL OR enrichment_status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE enrichment_status = 'enriched') AS enriched,
                COUNT(*) FILTER (WHERE enrichment_status = 'reviewed') AS reviewed,
                COUNT(*) FILTER (WHERE enrichment_status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE units_scanned_at IS NOT NULL) AS units_scanned,
                COUNT(*) FILTER (
                    WHERE units_scanned_at IS NULL
                      AND leasing_link IS NOT NULL
                      AND leasing_link <> ''
                ) AS units_pending
            FROM properties
            "#,
        )
        .fetch_one(pool)
        .await?;
        Ok(counts)
    }
}
