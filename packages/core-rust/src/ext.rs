//! Method-style composition and the `sequence!` / `parallel!` macros.

use std::sync::Arc;

use crate::context::{self, Bind, Then};
use crate::hooks::{self, Match, OnBefore, OnCancel, OnComplete, OnError, OnSuccess};
use crate::operation::{ContextOperation, Operation, SharedContextOperation, SharedOperation};

/// Combinators as methods on every [`Operation`].
///
/// ```
/// use opchain_core::{from_fn, noop, sequence, OperationExt};
///
/// let op = sequence![noop(), from_fn(|_cancel| async { Ok(()) })]
///     .on_success(|| println!("done"))
///     .on_complete(|| println!("settled"));
/// # let _ = op;
/// ```
pub trait OperationExt: Operation + Sized {
    /// Erase the concrete type behind an `Arc` so the operation can join a
    /// [`sequence`](crate::sequence) or [`parallel`](crate::parallel) group.
    fn shared(self) -> SharedOperation
    where
        Self: 'static,
    {
        Arc::new(self)
    }

    /// See [`hooks::on_before`].
    fn on_before<F>(self, action: F) -> OnBefore<Self, impl Fn() -> anyhow::Result<()> + Send + Sync>
    where
        F: Fn() + Send + Sync,
    {
        hooks::on_before(self, action)
    }

    /// See [`hooks::try_on_before`].
    fn try_on_before<F>(self, action: F) -> OnBefore<Self, F>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync,
    {
        hooks::try_on_before(self, action)
    }

    /// See [`hooks::on_success`].
    fn on_success<F>(self, action: F) -> OnSuccess<Self, F>
    where
        F: Fn() + Send + Sync,
    {
        hooks::on_success(self, action)
    }

    /// See [`hooks::on_error`]. The failure is swallowed.
    fn on_error<F>(self, action: F) -> OnError<Self, F>
    where
        F: Fn(&anyhow::Error) + Send + Sync,
    {
        hooks::on_error(self, action)
    }

    /// See [`hooks::on_cancel`]. The cancellation is swallowed.
    fn on_cancel<F>(self, action: F) -> OnCancel<Self, F>
    where
        F: Fn() + Send + Sync,
    {
        hooks::on_cancel(self, action)
    }

    /// See [`hooks::on_complete`].
    fn on_complete<F>(self, action: F) -> OnComplete<Self, F>
    where
        F: Fn() + Send + Sync,
    {
        hooks::on_complete(self, action)
    }

    /// See [`hooks::matching`]. Every outcome is swallowed.
    fn matching<S, C, E, K>(
        self,
        on_success: S,
        on_cancel: C,
        on_error: E,
        on_complete: K,
    ) -> Match<Self, S, C, E, K>
    where
        S: Fn() + Send + Sync,
        C: Fn() + Send + Sync,
        E: Fn(&anyhow::Error) + Send + Sync,
        K: Fn() + Send + Sync,
    {
        hooks::matching(self, on_success, on_cancel, on_error, on_complete)
    }

    /// See [`context::then`]. `next` may be context-free or contextual.
    fn then<B>(self, next: B) -> Then<Self, B> {
        context::then(self, next)
    }
}

impl<O: Operation> OperationExt for O {}

/// Conversions available on every [`ContextOperation<T>`].
///
/// Hooks apply to contextual operations through the free functions in
/// [`hooks`], which accept either shape.
pub trait ContextOperationExt<T>: ContextOperation<T> + Sized
where
    T: Send + 'static,
{
    /// Erase the concrete type behind an `Arc` so the operation can join a
    /// [`sequence_with`](crate::sequence_with) or
    /// [`parallel_with`](crate::parallel_with) group.
    fn shared_context(self) -> SharedContextOperation<T>
    where
        Self: 'static,
    {
        Arc::new(self)
    }

    /// See [`context::bind`].
    fn bind(self, ctx: T) -> Bind<Self, T>
    where
        T: Clone + Sync,
    {
        context::bind(self, ctx)
    }
}

impl<T: Send + 'static, C: ContextOperation<T>> ContextOperationExt<T> for C {}

/// Build a [`Sequence`](crate::Sequence) from heterogeneous operations.
///
/// ```
/// use std::time::Duration;
/// use opchain_core::{delay, noop, sequence};
///
/// let op = sequence![noop(), delay(Duration::from_millis(5))];
/// assert_eq!(op.len(), 2);
/// ```
#[macro_export]
macro_rules! sequence {
    () => {
        $crate::sequence(::std::vec::Vec::<$crate::SharedOperation>::new())
    };
    ($($op:expr),+ $(,)?) => {
        $crate::sequence([$($crate::OperationExt::shared($op)),+])
    };
}

/// Build a [`Parallel`](crate::Parallel) group from heterogeneous operations.
///
/// ```
/// use std::time::Duration;
/// use opchain_core::{delay, noop, parallel};
///
/// let op = parallel![noop(), delay(Duration::from_millis(5))];
/// assert_eq!(op.len(), 2);
/// ```
#[macro_export]
macro_rules! parallel {
    () => {
        $crate::parallel(::std::vec::Vec::<$crate::SharedOperation>::new())
    };
    ($($op:expr),+ $(,)?) => {
        $crate::parallel([$($crate::OperationExt::shared($op)),+])
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::leaf::{fail, from_context_fn, noop};
    use crate::Outcome;

    #[tokio::test]
    async fn method_chain_composes_hooks() {
        let completed = Arc::new(AtomicU32::new(0));
        let handled = Arc::new(AtomicU32::new(0));

        let op = fail(anyhow::anyhow!("E"))
            .on_error({
                let handled = handled.clone();
                move |_cause: &anyhow::Error| {
                    handled.fetch_add(1, Ordering::SeqCst);
                }
            })
            .on_complete({
                let completed = completed.clone();
                move || {
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            });

        op.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn macros_accept_mixed_operation_types() {
        let seq = sequence![noop(), fail(anyhow::anyhow!("E")), noop()];
        let group = parallel![noop(), noop().on_success(|| {})];

        assert_eq!(seq.len(), 3);
        assert_eq!(group.len(), 2);

        let cancel = CancellationToken::new();
        assert_eq!(Outcome::of(&seq.run(&cancel).await), Outcome::Failed);
        assert_eq!(Outcome::of(&group.run(&cancel).await), Outcome::Success);
        assert!(sequence![].is_empty());
    }

    #[tokio::test]
    async fn bind_and_then_via_methods() {
        let seen = Arc::new(AtomicU32::new(0));
        let ctx_op = {
            let seen = seen.clone();
            from_context_fn(move |ctx: u32, _cancel| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(ctx, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        let shared = ctx_op.shared_context();
        let op = noop().then(shared.clone().bind(4)).then(shared.bind(6));
        op.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }
}
