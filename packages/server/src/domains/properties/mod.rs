//! Properties domain - enrichment of property records and unit discovery
//!
//! - `enrichment`: search, fetch, extract and merge contact fields
//! - `units`: floor plans, units and specials from leasing pages
//! - `batch`: the per-property state machine that drives both

pub mod batch;
pub mod enrichment;
pub mod error;
pub mod models;
pub mod store;
pub mod units;

pub use batch::{BatchDriver, BatchPhase, BatchReport, BatchRequest, PropertyOutcome};
pub use error::EnrichmentError;
pub use models::*;
pub use store::PostgresPropertyStore;
