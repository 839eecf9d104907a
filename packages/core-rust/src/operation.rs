//! The two operation shapes.
//!
//! A context-free [`Operation`] is invoked with only a cancellation signal; a
//! [`ContextOperation<T>`] additionally receives a payload supplied by the
//! caller at invocation time. Both are stateless from the combinators' point
//! of view: the same value may be invoked many times, concurrently, from
//! independent call sites.
//!
//! The cancellation signal is owned by the caller and is read-only here.
//! Leaf operations observe it at their own suspension points and settle to
//! [`OpError::Cancelled`](crate::OpError::Cancelled) when they see it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::OpResult;

/// A cancellable unit of asynchronous work invoked with only a signal.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Run the operation to a single outcome.
    async fn run(&self, cancel: &CancellationToken) -> OpResult;
}

/// A cancellable unit of asynchronous work invoked with a payload.
///
/// The payload is never stored on the operation; each invocation brings its
/// own.
#[async_trait]
pub trait ContextOperation<T: Send + 'static>: Send + Sync {
    /// Run the operation against `ctx` to a single outcome.
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult;
}

/// Type-erased, shareable context-free operation.
pub type SharedOperation = Arc<dyn Operation>;

/// Type-erased, shareable contextual operation.
pub type SharedContextOperation<T> = Arc<dyn ContextOperation<T>>;

#[async_trait]
impl<O: Operation + ?Sized> Operation for Arc<O> {
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        (**self).run(cancel).await
    }
}

#[async_trait]
impl<O: Operation + ?Sized> Operation for Box<O> {
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        (**self).run(cancel).await
    }
}

#[async_trait]
impl<T: Send + 'static, C: ContextOperation<T> + ?Sized> ContextOperation<T> for Arc<C> {
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        (**self).run_with(ctx, cancel).await
    }
}

#[async_trait]
impl<T: Send + 'static, C: ContextOperation<T> + ?Sized> ContextOperation<T> for Box<C> {
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        (**self).run_with(ctx, cancel).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
