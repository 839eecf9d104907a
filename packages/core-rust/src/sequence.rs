//! Sequential composition: fail-fast, strictly ordered.
//!
//! Steps share one cancellation signal. The first step that does not succeed
//! ends the sequence; its outcome (same cause, or cancellation) becomes the
//! sequence's outcome and no later step is invoked.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{OpResult, Outcome};
use crate::operation::{ContextOperation, Operation, SharedContextOperation, SharedOperation};

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Context-free operations run one after another. See [`sequence`].
#[derive(Clone, Default)]
pub struct Sequence {
    steps: Vec<SharedOperation>,
}

/// Compose `ops` into a single operation that runs them in order.
///
/// An empty sequence succeeds immediately.
pub fn sequence<I>(ops: I) -> Sequence
where
    I: IntoIterator<Item = SharedOperation>,
{
    Sequence {
        steps: ops.into_iter().collect(),
    }
}

impl Sequence {
    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if there are no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step, returning the extended sequence.
    #[must_use]
    pub fn with(mut self, op: SharedOperation) -> Self {
        self.steps.push(op);
        self
    }
}

#[async_trait]
impl Operation for Sequence {
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        for (index, step) in self.steps.iter().enumerate() {
            let result = step.run(cancel).await;
            if result.is_err() {
                trace_early_exit(index, self.steps.len(), &result);
                return result;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SequenceWith
// ---------------------------------------------------------------------------

/// Contextual operations run one after another with the same payload. See
/// [`sequence_with`].
pub struct SequenceWith<T: Send + 'static> {
    steps: Vec<SharedContextOperation<T>>,
}

/// Compose contextual `ops` into one contextual operation that runs them in
/// order, handing each step a clone of the caller's payload.
pub fn sequence_with<T, I>(ops: I) -> SequenceWith<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = SharedContextOperation<T>>,
{
    SequenceWith {
        steps: ops.into_iter().collect(),
    }
}

impl<T: Send + 'static> SequenceWith<T> {
    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if there are no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<T: Send + 'static> Clone for SequenceWith<T> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

#[async_trait]
impl<T> ContextOperation<T> for SequenceWith<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        for (index, step) in self.steps.iter().enumerate() {
            let step_ctx = ctx.clone();
            let result = step.run_with(step_ctx, cancel).await;
            if result.is_err() {
                trace_early_exit(index, self.steps.len(), &result);
                return result;
            }
        }
        Ok(())
    }
}

fn trace_early_exit(index: usize, len: usize, result: &OpResult) {
    tracing::debug!(
        step = index,
        skipped = len - index - 1,
        outcome = %Outcome::of(result),
        "sequence stopped early"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
