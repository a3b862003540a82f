//! Error taxonomy for duplicate row filtering.
//!
//! Three kinds of failure matter to callers:
//! - [`DedupError::Configuration`] - invalid or contradictory settings, raised before
//!   any row is read
//! - [`DedupError::MalformedInput`] - a row whose key cells cannot be compared, or a
//!   missing key cell under the strict missing-value policy
//! - [`DedupError::Cancelled`] - a cooperative abort requested by the caller
//!
//! Every variant aborts the whole run; no partial output table is produced.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DedupError>;

/// Error type for configuration, row processing, and spill failures.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("malformed input in {stage} at row '{row_id}': {message}")]
    MalformedInput {
        stage: &'static str,
        row_id: String,
        message: String,
    },
    #[error("execution cancelled during {stage}")]
    Cancelled { stage: &'static str },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("spill failure: {0}")]
    Spill(String),
}

impl DedupError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn malformed(
        stage: &'static str,
        row_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedInput {
            stage,
            row_id: row_id.into(),
            message: message.into(),
        }
    }

    /// `true` when the run stopped because the caller asked it to, not because it failed.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Name of the pipeline stage the error was raised in, when known.
    #[must_use]
    pub const fn stage(&self) -> Option<&'static str> {
        match self {
            Self::MalformedInput { stage, .. } | Self::Cancelled { stage } => Some(stage),
            _ => None,
        }
    }
}

#[cfg(feature = "spilling")]
impl From<postcard::Error> for DedupError {
    fn from(e: postcard::Error) -> Self {
        Self::Spill(e.to_string())
    }
}
