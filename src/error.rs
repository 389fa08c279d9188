//! Typed errors for the retrieval pipeline.

use evidence_harness_core::models::SourceTier;

/// Why a single retrieval tier produced nothing usable.
///
/// Adapter failures never reach `retrieve` callers; the orchestrator logs
/// them and falls through to the next tier.
#[derive(Debug, thiserror::Error)]
pub enum AdapterFailure {
    #[error("{tier} tier timed out after {after_ms}ms")]
    Timeout { tier: SourceTier, after_ms: u64 },
    #[error("{tier} tier provider error: {message}")]
    Provider { tier: SourceTier, message: String },
    #[error("{tier} tier store error: {message}")]
    Store { tier: SourceTier, message: String },
}

impl AdapterFailure {
    pub fn tier(&self) -> SourceTier {
        match self {
            Self::Timeout { tier, .. } | Self::Provider { tier, .. } | Self::Store { tier, .. } => {
                *tier
            }
        }
    }
}

/// Errors surfaced to callers of `retrieve`.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
