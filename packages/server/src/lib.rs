// Property Enrichment - API Core
//
// Fills in missing contact fields on property records from web search and
// the property's own website, and discovers floor plans, units and specials
// from leasing pages.
//
// Enrichment logic lives in domains/properties; external services sit
// behind the kernel traits.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
