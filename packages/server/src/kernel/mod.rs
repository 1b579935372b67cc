//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod browserless_client;
pub mod content_fetcher;
pub mod deps;
pub mod direct_fetcher;
pub mod html_text;
pub mod serp_client;
pub mod test_dependencies;
pub mod traits;

pub use ai::OpenAIExtractor;
pub use browserless_client::BrowserlessClient;
pub use content_fetcher::{ContentFetcher, FetchOutcome};
pub use deps::ServerDeps;
pub use direct_fetcher::DirectFetcher;
pub use serp_client::SerpApiClient;
pub use test_dependencies::TestDependencies;
pub use traits::*;
