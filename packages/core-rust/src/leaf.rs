//! Helpers for writing leaf operations.
//!
//! Leaves are where suspension happens; combinators never poll the signal
//! themselves. These helpers turn closures into operations and give leaf
//! bodies a uniform way to observe cancellation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{OpError, OpResult};
use crate::operation::{ContextOperation, Operation};

// ---------------------------------------------------------------------------
// Signal helpers
// ---------------------------------------------------------------------------

/// Returns `Err(OpError::Cancelled)` if the signal has fired.
///
/// # Errors
///
/// Returns [`OpError::Cancelled`] once cancellation has been requested.
pub fn ensure_active(cancel: &CancellationToken) -> OpResult {
    if cancel.is_cancelled() {
        Err(OpError::Cancelled)
    } else {
        Ok(())
    }
}

/// Drive `fut` until it completes or the signal fires, whichever is first.
///
/// A signal that has already fired wins over a future that is ready on its
/// first poll.
///
/// # Errors
///
/// Returns [`OpError::Cancelled`] if the signal fires before `fut` completes.
pub async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, OpError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(OpError::Cancelled),
        out = fut => Ok(out),
    }
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

/// Context-free operation backed by a closure. See [`from_fn`].
#[derive(Clone)]
pub struct FnOperation<F> {
    f: F,
}

/// Build an [`Operation`] from a closure receiving its own handle to the
/// signal.
pub fn from_fn<F, Fut>(f: F) -> FnOperation<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = OpResult> + Send + 'static,
{
    FnOperation { f }
}

#[async_trait]
impl<F, Fut> Operation for FnOperation<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = OpResult> + Send + 'static,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        (self.f)(cancel.clone()).await
    }
}

/// Contextual operation backed by a closure. See [`from_context_fn`].
#[derive(Clone)]
pub struct ContextFnOperation<F> {
    f: F,
}

/// Build a [`ContextOperation`] from a closure receiving the payload and its
/// own handle to the signal.
pub fn from_context_fn<T, F, Fut>(f: F) -> ContextFnOperation<F>
where
    T: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = OpResult> + Send + 'static,
{
    ContextFnOperation { f }
}

#[async_trait]
impl<T, F, Fut> ContextOperation<T> for ContextFnOperation<F>
where
    T: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = OpResult> + Send + 'static,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        (self.f)(ctx, cancel.clone()).await
    }
}

// ---------------------------------------------------------------------------
// Stock leaves
// ---------------------------------------------------------------------------

/// Operation that succeeds immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

/// An operation that always succeeds without suspending.
#[must_use]
pub fn noop() -> Noop {
    Noop
}

#[async_trait]
impl Operation for Noop {
    async fn run(&self, _cancel: &CancellationToken) -> OpResult {
        Ok(())
    }
}

/// Operation that always fails with the same cause.
#[derive(Debug, Clone)]
pub struct Fail {
    cause: Arc<anyhow::Error>,
}

/// An operation that fails with `cause` on every invocation.
///
/// Every invocation reports the identical `Arc`, so callers can assert on
/// cause identity after propagation.
pub fn fail(cause: impl Into<anyhow::Error>) -> Fail {
    Fail {
        cause: Arc::new(cause.into()),
    }
}

impl Fail {
    /// The shared failure cause.
    #[must_use]
    pub fn cause(&self) -> &Arc<anyhow::Error> {
        &self.cause
    }
}

#[async_trait]
impl Operation for Fail {
    async fn run(&self, _cancel: &CancellationToken) -> OpResult {
        Err(OpError::Failed(self.cause.clone()))
    }
}

/// Operation that sleeps cooperatively.
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    duration: Duration,
}

/// An operation that suspends for `duration`, settling to cancelled if the
/// signal fires first.
#[must_use]
pub fn delay(duration: Duration) -> Delay {
    Delay { duration }
}

#[async_trait]
impl Operation for Delay {
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        until_cancelled(cancel, tokio::time::sleep(self.duration)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
