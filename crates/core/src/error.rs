//! The error taxonomy every pipeline stage and store trait returns.

use thiserror::Error;

/// A single kind from the ingestion/retrieval error taxonomy.
///
/// `ConflictPending` and `DuplicateDocument` are not failures from the
/// orchestrator's point of view — they are carried as `Ok` results with a
/// status flag, not as errors — so they are intentionally absent here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error in {stage}: {message}")]
    Validation { stage: &'static str, message: String },

    #[error("extraction failed in {stage}: {message}")]
    ExtractionFailed { stage: &'static str, message: String },

    #[error("unsupported format in {stage}: {message}")]
    UnsupportedFormat { stage: &'static str, message: String },

    #[error("transient provider error in {stage}: {message}")]
    ProviderTransient { stage: &'static str, message: String },

    #[error("permanent provider error in {stage}: {message}")]
    ProviderPermanent { stage: &'static str, message: String },

    #[error("store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },
}

impl CoreError {
    pub fn validation(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { stage, message: message.into() }
    }

    pub fn extraction_failed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::ExtractionFailed { stage, message: message.into() }
    }

    pub fn unsupported_format(stage: &'static str, message: impl Into<String>) -> Self {
        Self::UnsupportedFormat { stage, message: message.into() }
    }

    pub fn provider_transient(stage: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderTransient { stage, message: message.into() }
    }

    pub fn provider_permanent(stage: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderPermanent { stage, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable { message: message.into() }
    }

    /// The stage tag this error occurred in, for writing to `processing_log`.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation { stage, .. }
            | Self::ExtractionFailed { stage, .. }
            | Self::UnsupportedFormat { stage, .. }
            | Self::ProviderTransient { stage, .. }
            | Self::ProviderPermanent { stage, .. } => stage,
            Self::StoreUnavailable { .. } => "store",
            Self::NotFound { .. } => "lookup",
            Self::Forbidden { .. } => "auth",
        }
    }

    /// Whether the orchestrator should retry the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderTransient { .. })
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
