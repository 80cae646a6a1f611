//! Error taxonomy for the transformation pipeline.
//!
//! Failures are absorbed by the smallest unit that can contain them: a
//! [`PipelineError::RowTransformFailure`] drops one submission, the source and
//! sink errors drop one quarter, and only [`PipelineError::Environment`] and
//! [`PipelineError::Config`] stop a batch before it starts.

use crate::io::cloud::CloudIOError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input table could not be fetched.
    #[error("source {key} unavailable: {reason}")]
    SourceUnavailable { key: String, reason: String },

    /// A required input table was fetched but holds no data rows.
    #[error("source {key} contains no rows")]
    EmptySource { key: String },

    /// Listing a quarter's prefix returned nothing.
    #[error("no source files under {prefix}")]
    NoSourceFiles { prefix: String },

    /// One submission could not be turned into a document.
    #[error("failed to transform submission {name}: {reason}")]
    RowTransformFailure { name: String, reason: String },

    /// The quarter artifact could not be written.
    #[error("sink {key} unavailable: {reason}")]
    SinkUnavailable { key: String, reason: String },

    #[error("failed to serialize quarter {quarter}: {source}")]
    Serialization {
        quarter: String,
        #[source]
        source: serde_json::Error,
    },

    /// A quarter worker panicked; caught at the scheduling boundary.
    #[error("worker for quarter {quarter} panicked: {message}")]
    QuarterPanicked { quarter: String, message: String },

    /// Storage is unreachable or misconfigured; nothing can be processed.
    #[error("environment error: {0}")]
    Environment(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn source_unavailable(key: &str, err: &CloudIOError) -> Self {
        Self::SourceUnavailable {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn sink_unavailable(key: &str, err: &CloudIOError) -> Self {
        Self::SinkUnavailable {
            key: key.to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether this error means "skip the quarter" rather than "the quarter failed".
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::EmptySource { .. } | Self::NoSourceFiles { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Render a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
