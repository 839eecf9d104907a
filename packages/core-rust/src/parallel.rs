//! Parallel composition: join-all, no fail-fast.
//!
//! Every branch is started with the same cancellation signal and the group
//! settles only after **every** branch has settled, including branches still
//! running after a sibling failed. Siblings are never cancelled on failure.
//!
//! When branches disagree, the reported outcome is chosen as follows:
//!
//! 1. any failure: the failure of the first failing branch in membership
//!    order (later failures are logged at `debug` and dropped);
//! 2. otherwise any cancellation: `Cancelled`;
//! 3. otherwise `Success`.

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::{OpError, OpResult};
use crate::operation::{ContextOperation, Operation, SharedContextOperation, SharedOperation};

// ---------------------------------------------------------------------------
// Parallel
// ---------------------------------------------------------------------------

/// Context-free operations run concurrently. See [`parallel`].
#[derive(Clone, Default)]
pub struct Parallel {
    branches: Vec<SharedOperation>,
}

/// Compose `ops` into a single operation that runs them concurrently and
/// waits for all of them.
///
/// An empty group succeeds immediately.
pub fn parallel<I>(ops: I) -> Parallel
where
    I: IntoIterator<Item = SharedOperation>,
{
    Parallel {
        branches: ops.into_iter().collect(),
    }
}

impl Parallel {
    /// Number of branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Returns `true` if there are no branches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Add a branch, returning the extended group.
    #[must_use]
    pub fn with(mut self, op: SharedOperation) -> Self {
        self.branches.push(op);
        self
    }
}

#[async_trait]
impl Operation for Parallel {
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        let runs: Vec<_> = self.branches.iter().map(|branch| branch.run(cancel)).collect();
        settle(join_all(runs).await)
    }
}

// ---------------------------------------------------------------------------
// ParallelWith
// ---------------------------------------------------------------------------

/// Contextual operations run concurrently with the same payload. See
/// [`parallel_with`].
pub struct ParallelWith<T: Send + 'static> {
    branches: Vec<SharedContextOperation<T>>,
}

/// Compose contextual `ops` into one contextual operation that runs them
/// concurrently, handing each branch a clone of the caller's payload.
pub fn parallel_with<T, I>(ops: I) -> ParallelWith<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = SharedContextOperation<T>>,
{
    ParallelWith {
        branches: ops.into_iter().collect(),
    }
}

impl<T: Send + 'static> ParallelWith<T> {
    /// Number of branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Returns `true` if there are no branches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl<T: Send + 'static> Clone for ParallelWith<T> {
    fn clone(&self) -> Self {
        Self {
            branches: self.branches.clone(),
        }
    }
}

#[async_trait]
impl<T> ContextOperation<T> for ParallelWith<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        let runs: Vec<_> = self
            .branches
            .iter()
            .map(|branch| branch.run_with(ctx.clone(), cancel))
            .collect();
        settle(join_all(runs).await)
    }
}

/// Reduce the settled branch results to the group's single outcome.
fn settle(results: Vec<OpResult>) -> OpResult {
    let mut first_failure = None;
    let mut cancelled = 0usize;

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(()) => {}
            Err(OpError::Cancelled) => cancelled += 1,
            Err(err @ OpError::Failed(_)) => {
                if first_failure.is_none() {
                    first_failure = Some(err);
                } else {
                    tracing::debug!(branch = index, error = %err, "dropping additional parallel failure");
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None if cancelled > 0 => {
            tracing::trace!(cancelled, "parallel group cancelled");
            Err(OpError::Cancelled)
        }
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
