//! Unit discovery: floor plans, units and specials from leasing pages.

pub mod discovery;
pub mod persist;
pub mod types;

pub use discovery::UnitDiscoveryService;
pub use persist::persist_discovery;
pub use types::*;
