//! Outcome types shared by every operation.
//!
//! An invocation settles to exactly one of three outcomes:
//!
//! | Outcome   | Representation                  |
//! |-----------|---------------------------------|
//! | Success   | `Ok(())`                        |
//! | Cancelled | `Err(OpError::Cancelled)`       |
//! | Failed    | `Err(OpError::Failed(cause))`   |
//!
//! Cancellation is never a failure. Combinators that only propagate keep the
//! failure cause's `Arc` intact, so callers can compare causes by identity.

use std::sync::Arc;

use serde::Serialize;

/// Result of invoking an operation.
pub type OpResult = Result<(), OpError>;

/// Non-success outcome of an operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpError {
    /// The cancellation signal was observed.
    #[error("operation cancelled")]
    Cancelled,
    /// Any other exceptional condition, carrying its cause.
    #[error("operation failed: {0}")]
    Failed(Arc<anyhow::Error>),
}

impl OpError {
    /// Wrap `cause` as a failure.
    pub fn failed(cause: impl Into<anyhow::Error>) -> Self {
        Self::Failed(Arc::new(cause.into()))
    }

    /// Returns `true` for [`OpError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` for [`OpError::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The failure cause, if this is a failure.
    #[must_use]
    pub fn cause(&self) -> Option<&Arc<anyhow::Error>> {
        match self {
            Self::Failed(cause) => Some(cause),
            Self::Cancelled => None,
        }
    }
}

impl From<anyhow::Error> for OpError {
    fn from(cause: anyhow::Error) -> Self {
        Self::Failed(Arc::new(cause))
    }
}

/// Fieldless view of an [`OpResult`], used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Cancelled,
    Failed,
}

impl Outcome {
    /// Classify an invocation result.
    #[must_use]
    pub fn of(result: &OpResult) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(OpError::Cancelled) => Self::Cancelled,
            Err(OpError::Failed(_)) => Self::Failed,
        }
    }

    /// Lowercase label, suitable for span fields and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
