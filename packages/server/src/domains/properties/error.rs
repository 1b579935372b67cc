use thiserror::Error;

/// Errors that escape the enrichment pipeline.
///
/// Everything else (search, fetch, LLM failures) is recovered at the call
/// site and reported as data in the result envelope.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Enrichment is not configured: missing {0}")]
    NotConfigured(String),

    #[error("Property has no address to enrich from")]
    MissingAddress,

    #[error("Confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),

    #[error("Property not found: {0}")]
    PropertyNotFound(uuid::Uuid),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}
