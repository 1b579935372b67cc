pub mod floor_plan;
pub mod property;
pub mod special;
pub mod unit;

pub use floor_plan::FloorPlan;
pub use property::{EnrichmentStatus, Property, PropertySelection, StatusCounts};
pub use special::Special;
pub use unit::Unit;
