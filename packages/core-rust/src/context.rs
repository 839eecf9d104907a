//! Bridging between context-free and contextual operations.
//!
//! - [`then`]: context-free step, then a contextual step. The result is
//!   contextual; the first step never sees the payload.
//! - [`bind`]: curry a fixed payload into a contextual operation, giving a
//!   context-free one.
//! - [`then_with_context`]: `bind` followed by a context-free step.
//! - [`ignore_context`]: lift a context-free operation to any payload type.
//!
//! All chaining here is fail-fast in the same way as
//! [`sequence`](crate::sequence): the second step only runs after the first
//! succeeded, and the first non-success outcome is reported unchanged.

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::OpResult;
use crate::operation::{ContextOperation, Operation};

// ---------------------------------------------------------------------------
// Then
// ---------------------------------------------------------------------------

/// Two steps run in order. See [`then`].
///
/// `Then<A, B>` is an [`Operation`] when both sides are context-free, and a
/// [`ContextOperation<T>`] when `A` is context-free and `B` is contextual.
#[derive(Clone)]
pub struct Then<A, B> {
    first: A,
    second: B,
}

/// Run `first`, then `second` if `first` succeeded.
///
/// With a contextual `second`, the resulting operation is contextual and the
/// payload goes to `second` only.
pub fn then<A, B>(first: A, second: B) -> Then<A, B> {
    Then { first, second }
}

#[async_trait]
impl<A, B> Operation for Then<A, B>
where
    A: Operation,
    B: Operation,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        self.first.run(cancel).await?;
        self.second.run(cancel).await
    }
}

#[async_trait]
impl<T, A, B> ContextOperation<T> for Then<A, B>
where
    T: Send + 'static,
    A: Operation,
    B: ContextOperation<T>,
{
    async fn run_with(&self, ctx: T, cancel: &CancellationToken) -> OpResult {
        self.first.run(cancel).await?;
        self.second.run_with(ctx, cancel).await
    }
}

// ---------------------------------------------------------------------------
// Bind
// ---------------------------------------------------------------------------

/// A contextual operation with its payload fixed. See [`bind`].
#[derive(Clone)]
pub struct Bind<C, T> {
    inner: C,
    ctx: T,
}

/// Curry `ctx` into `op`, producing a context-free operation.
///
/// Each invocation hands `op` its own clone of `ctx`.
pub fn bind<C, T>(op: C, ctx: T) -> Bind<C, T>
where
    T: Clone + Send + Sync + 'static,
    C: ContextOperation<T>,
{
    Bind { inner: op, ctx }
}

impl<C, T> Bind<C, T> {
    /// The fixed payload.
    pub fn context(&self) -> &T {
        &self.ctx
    }
}

#[async_trait]
impl<C, T> Operation for Bind<C, T>
where
    T: Clone + Send + Sync + 'static,
    C: ContextOperation<T>,
{
    async fn run(&self, cancel: &CancellationToken) -> OpResult {
        let ctx = self.ctx.clone();
        self.inner.run_with(ctx, cancel).await
    }
}

/// Run `op` with the fixed payload `ctx`, then `next`.
///
/// The result is context-free, so it can keep chaining with other
/// context-free operations.
pub fn then_with_context<C, T, O>(op: C, ctx: T, next: O) -> Then<Bind<C, T>, O>
where
    T: Clone + Send + Sync + 'static,
    C: ContextOperation<T>,
    O: Operation,
{
    then(bind(op, ctx), next)
}

// ---------------------------------------------------------------------------
// IgnoreContext
// ---------------------------------------------------------------------------

/// A context-free operation accepting, and discarding, a payload of type `T`.
/// See [`ignore_context`].
pub struct IgnoreContext<O, T> {
    inner: O,
    _payload: PhantomData<fn(T)>,
}

/// Lift `op` into a contextual operation that drops its payload.
///
/// Useful for mixing context-free steps into
/// [`sequence_with`](crate::sequence_with) and
/// [`parallel_with`](crate::parallel_with).
pub fn ignore_context<O, T>(op: O) -> IgnoreContext<O, T>
where
    O: Operation,
    T: Send + 'static,
{
    IgnoreContext {
        inner: op,
        _payload: PhantomData,
    }
}

impl<O: Clone, T> Clone for IgnoreContext<O, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<O, T> ContextOperation<T> for IgnoreContext<O, T>
where
    O: Operation,
    T: Send + 'static,
{
    async fn run_with(&self, _ctx: T, cancel: &CancellationToken) -> OpResult {
        self.inner.run(cancel).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::OpError;
    use crate::leaf::{fail, from_context_fn, from_fn};
    use crate::operation::SharedContextOperation;
    use crate::{parallel_with, sequence, sequence_with, OperationExt};

    type Log = Arc<Mutex<Vec<String>>>;

    fn step(log: &Log, label: &'static str) -> impl Operation + Clone {
        let log = log.clone();
        from_fn(move |_cancel| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(label.to_string());
                Ok(())
            }
        })
    }

    fn ctx_step(log: &Log, label: &'static str) -> impl ContextOperation<u32> + Clone {
        let log = log.clone();
        from_context_fn(move |ctx: u32, _cancel| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{label}:{ctx}"));
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn then_runs_context_free_step_first() {
        let log = Log::default();
        let op = then(step(&log, "prepare"), ctx_step(&log, "apply"));

        op.run_with(3, &CancellationToken::new()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["prepare", "apply:3"]);
    }

    #[tokio::test]
    async fn then_is_fail_fast() {
        let log = Log::default();
        let first = fail(anyhow::anyhow!("E"));
        let cause = first.cause().clone();
        let op = then(first, ctx_step(&log, "apply"));

        let err = op.run_with(3, &CancellationToken::new()).await.unwrap_err();
        assert!(Arc::ptr_eq(err.cause().unwrap(), &cause));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn then_mirrors_cancellation_of_first_step() {
        let log = Log::default();
        let first = from_fn(|cancel: CancellationToken| async move {
            crate::leaf::ensure_active(&cancel)
        });
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = then(first, ctx_step(&log, "apply"))
            .run_with(1, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn then_with_both_steps_context_free() {
        let log = Log::default();
        then(step(&log, "a"), step(&log, "b"))
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn currying_matches_direct_invocation() {
        let curried_log = Log::default();
        let curried = then_with_context(
            ctx_step(&curried_log, "ctx"),
            42,
            step(&curried_log, "next"),
        );
        curried.run(&CancellationToken::new()).await.unwrap();

        let direct_log = Log::default();
        let cancel = CancellationToken::new();
        ctx_step(&direct_log, "ctx").run_with(42, &cancel).await.unwrap();
        step(&direct_log, "next").run(&cancel).await.unwrap();

        assert_eq!(*curried_log.lock().unwrap(), *direct_log.lock().unwrap());
    }

    #[tokio::test]
    async fn curried_failure_skips_next_step() {
        let log = Log::default();
        let failing = from_context_fn(|_ctx: u32, _cancel| async {
            Err(OpError::failed(anyhow::anyhow!("bad payload")))
        });

        let err = then_with_context(failing, 1, step(&log, "next"))
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_failed());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bound_operation_chains_with_context_free_steps() {
        let log = Log::default();
        let bound = bind(ctx_step(&log, "bound"), 8);
        assert_eq!(*bound.context(), 8);

        sequence([step(&log, "start").shared(), bound.shared(), step(&log, "end").shared()])
            .run(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["start", "bound:8", "end"]);
    }

    #[tokio::test]
    async fn ignore_context_mixes_into_contextual_groups() {
        let log = Log::default();
        let plain: SharedContextOperation<u32> = Arc::new(ignore_context::<_, u32>(step(&log, "plain")));
        let contextual: SharedContextOperation<u32> = Arc::new(ctx_step(&log, "ctx"));

        sequence_with([plain.clone(), contextual.clone()])
            .run_with(5, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["plain", "ctx:5"]);

        let calls = Arc::new(AtomicU32::new(0));
        let counting: SharedContextOperation<u32> = {
            let calls = calls.clone();
            Arc::new(ignore_context::<_, u32>(from_fn(move |_cancel| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })))
        };
        parallel_with([counting.clone(), counting])
            .run_with(0, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reuse_with_independent_signals_does_not_leak() {
        let log = Log::default();
        let op = then(
            from_fn(|cancel: CancellationToken| async move { crate::leaf::ensure_active(&cancel) }),
            ctx_step(&log, "apply"),
        );

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let live = CancellationToken::new();

        let first = op.run_with(1, &cancelled).await;
        let second = op.run_with(2, &live).await;

        assert!(first.unwrap_err().is_cancelled());
        second.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["apply:2"]);
    }
}
