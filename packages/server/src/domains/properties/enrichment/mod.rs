//! Enrichment pipeline: search, fetch, extract, analyze and merge.

pub mod denylist;
pub mod extraction;
pub mod field_analysis;
pub mod merge;
pub mod orchestrator;
pub mod prompts;
pub mod search;
pub mod types;

pub use field_analysis::analyze;
pub use merge::{merge, MergeOutcome, PropertyUpdate};
pub use orchestrator::{DeepSearchRequest, EnrichOptions, EnrichmentOrchestrator};
pub use search::{SearchOutcome, SearchProvider, SearchResolution};
pub use types::*;
