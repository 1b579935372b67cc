// Domain modules
pub mod properties;
