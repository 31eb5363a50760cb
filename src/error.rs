//! Advisor error taxonomy.
//!
//! Every user-facing failure path maps onto one of these variants. None of
//! them triggers an automatic retry anywhere; resubmitting is always the
//! user's call.

/// Errors surfaced by the advisor client and its supporting modules.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    /// The catalog could not be fetched or parsed. Any previously loaded
    /// catalog is kept; the UI falls back to a placeholder view.
    #[error("catalog load failed: {0}")]
    CatalogLoad(String),

    /// A routine was requested with nothing selected.
    #[error("nothing selected — choose at least one product before generating a routine")]
    EmptySelection,

    /// A required endpoint or credential is missing from configuration.
    #[error("not configured: {0}")]
    Configuration(String),

    /// The relay (or the upstream behind it) could not be reached or
    /// returned an unusable response.
    #[error("request failed: {0}")]
    Transport(String),

    /// Persisted state could not be read back. The affected entry is reset
    /// to empty; this error is logged, never shown as a hard failure.
    #[error("stored state unreadable: {0}")]
    Persistence(String),
}
