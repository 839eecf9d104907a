//! `opchain` Core: cancellable async operations and the combinators that compose them.
//!
//! An operation is a reusable, stateless unit of asynchronous work invoked
//! with a [`CancellationToken`]; it settles to success, cancellation, or a
//! failure carrying its cause ([`OpResult`]). Combinators build bigger
//! operations out of smaller ones without mutating them:
//!
//! 1. **Sequence** (`sequence`): ordered, fail-fast
//! 2. **Parallel** (`parallel`): concurrent, waits for every branch
//! 3. **Hooks** (`hooks`): before / success / error / cancel / complete / match
//! 4. **Context threading** (`context`): `then`, `bind`, `then_with_context`
//!
//! Only the host originates cancellation; combinators pass the caller's
//! signal unchanged to every step.
//!
//! See [`hooks`] before using `on_error`, `on_cancel` or `matching`: they
//! swallow the outcome they intercept.

pub mod context;
pub mod error;
pub mod ext;
pub mod hooks;
pub mod leaf;
pub mod operation;
pub mod parallel;
pub mod sequence;

pub use context::{bind, ignore_context, then, then_with_context, Bind, IgnoreContext, Then};
pub use error::{OpError, OpResult, Outcome};
pub use ext::{ContextOperationExt, OperationExt};
pub use hooks::{
    matching, on_before, on_cancel, on_complete, on_error, on_success, try_on_before, Match,
    OnBefore, OnCancel, OnComplete, OnError, OnSuccess,
};
pub use leaf::{
    delay, ensure_active, fail, from_context_fn, from_fn, noop, until_cancelled,
    ContextFnOperation, Delay, Fail, FnOperation, Noop,
};
pub use operation::{ContextOperation, Operation, SharedContextOperation, SharedOperation};
pub use parallel::{parallel, parallel_with, Parallel, ParallelWith};
pub use sequence::{sequence, sequence_with, Sequence, SequenceWith};

// Re-export the signal type so leaf authors need no direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
