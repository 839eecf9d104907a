//! Lifecycle hooks attached by wrapping.
//!
//! Each hook wraps one operation and yields an operation of the same shape:
//! a hook struct implements [`Operation`] when its inner value does, and
//! [`ContextOperation<T>`] when its inner value does. The base operation is
//! never modified, so one operation can carry several independent hook sets.
//!
//! Hook actions are synchronous closures and run to completion at the
//! lifecycle event that triggers them.
//!
//! | Hook            | Fires on                          | Outcome reported to the caller          |
//! |-----------------|-----------------------------------|-----------------------------------------|
//! | [`on_before`]   | always, before the inner starts   | inner outcome; a failing action aborts  |
//! | [`on_success`]  | success                           | unchanged                               |
//! | [`on_error`]    | failure (never cancellation)      | failure **swallowed**, reports success  |
//! | [`on_cancel`]   | cancellation                      | cancellation swallowed, reports success |
//! | [`on_complete`] | every outcome, exactly once       | cancellation swallowed, failure kept    |
//! | [`matching`]    | one of success/cancel/error, then complete | always success                 |
//!
//! # Swallowing hooks hide outcomes
//!
//! `on_error`, `on_cancel` and `matching` consume the outcome they intercept.
//! Anything composed *outside* of them (a [`sequence`](crate::sequence), a
//! [`parallel`](crate::parallel) group, the top-level caller) never sees that
//! failure or cancellation. A sequence containing an `on_error`-wrapped step
//! keeps running after that step fails. Place these hooks at the boundary
//! where the outcome is really handled, not deep inside a chain.

use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{OpError, OpResult};
use crate::operation::{ContextOperation, Operation};

// ---------------------------------------------------------------------------
// Outcome handling shared by both shapes
// ---------------------------------------------------------------------------

/// Runs its action when dropped, so the action fires exactly once whether the
/// wrapped future settles, unwinds, or is dropped mid-flight.
struct Finally<'a, F: Fn()> {
    action: &'a F,
}

impl<F: Fn()> Drop for Finally<'_, F> {
    fn drop(&mut self) {
        (self.action)();
    }
}

async fn run_before<B, Fut>(action: &B, run: impl FnOnce() -> Fut) -> OpResult
where
    B: Fn() -> anyhow::Result<()>,
    Fut: Future<Output = OpResult>,
{
    action()?;
    run().await
}

async fn run_success<F: Fn()>(action: &F, fut: impl Future<Output = OpResult>) -> OpResult {
    let result = fut.await;
    if result.is_ok() {
        action();
    }
    result
}

async fn run_error<F: Fn(&anyhow::Error)>(action: &F, fut: impl Future<Output = OpResult>) -> OpResult {
    match fut.await {
        Err(OpError::Failed(cause)) => {
            tracing::debug!(error = %cause, "failure handled by on_error hook");
            let cause: &anyhow::Error = &cause;
            action(cause);
            Ok(())
        }
        other => other,
    }
}

async fn run_cancel<F: Fn()>(action: &F, fut: impl Future<Output = OpResult>) -> OpResult {
    match fut.await {
        Err(OpError::Cancelled) => {
            action();
            Ok(())
        }
        other => other,
    }
}

async fn run_complete<F: Fn()>(action: &F, fut: impl Future<Output = OpResult>) -> OpResult {
    let guard = Finally { action };
    let result = fut.await;
    drop(guard);
    match result {
        Err(OpError::Cancelled) => Ok(()),
        other => other,
    }
}

async fn run_match<S, C, E, K>(
    on_success: &S,
    on_cancel: &C,
    on_error: &E,
    on_complete: &K,
    fut: impl Future<Output = OpResult>,
) -> OpResult
where
    S: Fn(),
    C: Fn(),
    E: Fn(&anyhow::Error),
    K: Fn(),
{
    let guard = Finally {
        action: on_complete,
    };
    match fut.await {
        Ok(()) => on_success(),
        Err(OpError::Cancelled) => on_cancel(),
        Err(OpError::Failed(cause)) => {
            let cause: &anyhow::Error = &cause;
            on_error(cause);
        }
    }
    drop(guard);
    Ok(())
}

// ---------------------------------------------------------------------------
// OnBefore
// ---------------------------------------------------------------------------

/// Runs an action before the inner operation starts. See [`on_before`].
#[derive(Clone)]
pub struct OnBefore<O, F> {
    inner: O,
    action: F,
}

/// Run `action` before every invocation of `op`.
pub fn on_before<O, F>(op: O, action: F) -> OnBefore<O, impl Fn() -> anyhow::Result<()> + Send + Sync>
where
    F: Fn() + Send + Sync,
{
    try_on_before(op, move || {
        action();
        Ok(())
    })
}

/// Run a fallible `action` before every invocation of `op`.
///
/// If the action fails, its error becomes the wrapper's failure cause and
/// `op` is not invoked.
pub fn try_on_before<O, F>(op: O, action: F) -> OnBefore<O, F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    OnBefore { inner: op, action }
}

#[async_trait]
impl<O, F> Operation for OnBefore<O, F>
where
    O: Operation,
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        run_before(&self.action, || self.inner.run(cancel)).await
    }
}

#[async_trait]
impl<T, O, F> ContextOperation<T> for OnBefore<O, F>
where
    T: Send + 'static,
    O: ContextOperation<T>,
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        run_before(&self.action, || self.inner.run_with(ctx, cancel)).await
    }
}

// ---------------------------------------------------------------------------
// OnSuccess
// ---------------------------------------------------------------------------

/// Runs an action after the inner operation succeeds. See [`on_success`].
#[derive(Clone)]
pub struct OnSuccess<O, F> {
    inner: O,
    action: F,
}

/// Run `action` after `op` succeeds. Other outcomes pass through untouched.
pub fn on_success<O, F>(op: O, action: F) -> OnSuccess<O, F>
where
    F: Fn() + Send + Sync,
{
    OnSuccess { inner: op, action }
}

#[async_trait]
impl<O, F> Operation for OnSuccess<O, F>
where
    O: Operation,
    F: Fn() + Send + Sync,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        run_success(&self.action, self.inner.run(cancel)).await
    }
}

#[async_trait]
impl<T, O, F> ContextOperation<T> for OnSuccess<O, F>
where
    T: Send + 'static,
    O: ContextOperation<T>,
    F: Fn() + Send + Sync,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        run_success(&self.action, self.inner.run_with(ctx, cancel)).await
    }
}

// ---------------------------------------------------------------------------
// OnError
// ---------------------------------------------------------------------------

/// Handles and swallows a failure of the inner operation. See [`on_error`].
#[derive(Clone)]
pub struct OnError<O, F> {
    inner: O,
    action: F,
}

/// Run `action` with the cause when `op` fails, then report success.
///
/// Cancellation is not a failure and passes through untouched. The failure
/// itself is consumed: callers of the wrapper never observe it.
pub fn on_error<O, F>(op: O, action: F) -> OnError<O, F>
where
    F: Fn(&anyhow::Error) + Send + Sync,
{
    OnError { inner: op, action }
}

#[async_trait]
impl<O, F> Operation for OnError<O, F>
where
    O: Operation,
    F: Fn(&anyhow::Error) + Send + Sync,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        run_error(&self.action, self.inner.run(cancel)).await
    }
}

#[async_trait]
impl<T, O, F> ContextOperation<T> for OnError<O, F>
where
    T: Send + 'static,
    O: ContextOperation<T>,
    F: Fn(&anyhow::Error) + Send + Sync,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        run_error(&self.action, self.inner.run_with(ctx, cancel)).await
    }
}

// ---------------------------------------------------------------------------
// OnCancel
// ---------------------------------------------------------------------------

/// Handles and swallows cancellation of the inner operation. See [`on_cancel`].
#[derive(Clone)]
pub struct OnCancel<O, F> {
    inner: O,
    action: F,
}

/// Run `action` when `op` is cancelled, then report success.
pub fn on_cancel<O, F>(op: O, action: F) -> OnCancel<O, F>
where
    F: Fn() + Send + Sync,
{
    OnCancel { inner: op, action }
}

#[async_trait]
impl<O, F> Operation for OnCancel<O, F>
where
    O: Operation,
    F: Fn() + Send + Sync,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        run_cancel(&self.action, self.inner.run(cancel)).await
    }
}

#[async_trait]
impl<T, O, F> ContextOperation<T> for OnCancel<O, F>
where
    T: Send + 'static,
    O: ContextOperation<T>,
    F: Fn() + Send + Sync,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        run_cancel(&self.action, self.inner.run_with(ctx, cancel)).await
    }
}

// ---------------------------------------------------------------------------
// OnComplete
// ---------------------------------------------------------------------------

/// Runs an action whatever the inner operation's outcome. See [`on_complete`].
#[derive(Clone)]
pub struct OnComplete<O, F> {
    inner: O,
    action: F,
}

/// Run `action` exactly once after `op` settles, whatever the outcome.
///
/// Cancellation is converted to success; a failure still propagates after
/// the action has run. The action also runs if the invocation is dropped
/// before it settles or unwinds from a panic.
pub fn on_complete<O, F>(op: O, action: F) -> OnComplete<O, F>
where
    F: Fn() + Send + Sync,
{
    OnComplete { inner: op, action }
}

#[async_trait]
impl<O, F> Operation for OnComplete<O, F>
where
    O: Operation,
    F: Fn() + Send + Sync,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        run_complete(&self.action, self.inner.run(cancel)).await
    }
}

#[async_trait]
impl<T, O, F> ContextOperation<T> for OnComplete<O, F>
where
    T: Send + 'static,
    O: ContextOperation<T>,
    F: Fn() + Send + Sync,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        run_complete(&self.action, self.inner.run_with(ctx, cancel)).await
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// Dispatches on the inner operation's outcome and always reports success.
/// See [`matching`].
#[derive(Clone)]
pub struct Match<O, S, C, E, K> {
    inner: O,
    on_success: S,
    on_cancel: C,
    on_error: E,
    on_complete: K,
}

/// Run exactly one of `on_success`, `on_cancel` or `on_error` according to
/// `op`'s outcome, then `on_complete`.
///
/// Every outcome is consumed; the wrapper always reports success.
pub fn matching<O, S, C, E, K>(
    op: O,
    on_success: S,
    on_cancel: C,
    on_error: E,
    on_complete: K,
) -> Match<O, S, C, E, K>
where
    S: Fn() + Send + Sync,
    C: Fn() + Send + Sync,
    E: Fn(&anyhow::Error) + Send + Sync,
    K: Fn() + Send + Sync,
{
    Match {
        inner: op,
        on_success,
        on_cancel,
        on_error,
        on_complete,
    }
}

#[async_trait]
impl<O, S, C, E, K> Operation for Match<O, S, C, E, K>
where
    O: Operation,
    S: Fn() + Send + Sync,
    C: Fn() + Send + Sync,
    E: Fn(&anyhow::Error) + Send + Sync,
    K: Fn() + Send + Sync,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        run_match(
            &self.on_success,
            &self.on_cancel,
            &self.on_error,
            &self.on_complete,
            self.inner.run(cancel),
        )
        .await
    }
}

#[async_trait]
impl<T, O, S, C, E, K> ContextOperation<T> for Match<O, S, C, E, K>
where
    T: Send + 'static,
    O: ContextOperation<T>,
    S: Fn() + Send + Sync,
    C: Fn() + Send + Sync,
    E: Fn(&anyhow::Error) + Send + Sync,
    K: Fn() + Send + Sync,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        run_match(
            &self.on_success,
            &self.on_cancel,
            &self.on_error,
            &self.on_complete,
            self.inner.run_with(ctx, cancel),
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
