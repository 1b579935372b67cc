// HTTP routes
pub mod error;
pub mod health;
pub mod property;

pub use error::ApiError;
pub use health::*;
pub use property::*;
