use opchain_core::{OpError, Outcome};
use tokio_util::sync::CancellationToken;

/// A single run of an operation, as it flows through the pipeline.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub call_id: u64,
    /// Human-readable label used in spans and logs.
    pub name: String,
    /// Signal handed to the operation. Middleware may narrow it to a child.
    pub cancel: CancellationToken,
    /// Deadline for this run; `None` disables the timeout layer.
    pub timeout_ms: Option<u64>,
}

impl Invocation {
    #[must_use]
    pub fn new(call_id: u64, name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            call_id,
            name: name.into(),
            cancel,
            timeout_ms: None,
        }
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Errors returned by the run pipeline.
///
/// A cancelled operation is not an error here: it is reported as
/// `Ok(Outcome::Cancelled)`.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Operation(#[from] OpError),
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("runner overloaded, try again later")]
    Overloaded,
    #[error("runner is shutting down")]
    ShuttingDown,
}

impl RunError {
    /// Label for metrics and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Operation(_) => Outcome::Failed.as_str(),
            Self::Timeout { .. } => "timeout",
            Self::Overloaded => "overloaded",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

/// Label for a pipeline result.
#[must_use]
pub fn result_label(result: &Result<Outcome, RunError>) -> &'static str {
    match result {
        Ok(outcome) => outcome.as_str(),
        Err(err) => err.label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_every_result() {
        assert_eq!(result_label(&Ok(Outcome::Success)), "success");
        assert_eq!(result_label(&Ok(Outcome::Cancelled)), "cancelled");
        assert_eq!(
            result_label(&Err(RunError::Operation(OpError::failed(anyhow::anyhow!("x"))))),
            "failed"
        );
        assert_eq!(result_label(&Err(RunError::Timeout { timeout_ms: 5 })), "timeout");
        assert_eq!(result_label(&Err(RunError::Overloaded)), "overloaded");
    }

    #[test]
    fn operation_error_displays_transparently() {
        let err = RunError::from(OpError::failed(anyhow::anyhow!("disk full")));
        assert_eq!(err.to_string(), "operation failed: disk full");
    }

    #[test]
    fn builder_sets_timeout() {
        let inv = Invocation::new(3, "fade", CancellationToken::new()).with_timeout_ms(Some(250));
        assert_eq!(inv.call_id, 3);
        assert_eq!(inv.name, "fade");
        assert_eq!(inv.timeout_ms, Some(250));
    }
}
