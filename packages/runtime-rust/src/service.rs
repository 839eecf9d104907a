//! Adapter from an [`Operation`] to a Tower service.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use opchain_core::{OpError, Operation, Outcome};
use tower::Service;

use crate::invocation::{Invocation, RunError};

/// Boxed future returned by every service in the run pipeline.
pub type RunFuture = Pin<Box<dyn Future<Output = Result<Outcome, RunError>> + Send>>;

// ---------------------------------------------------------------------------
// OperationService
// ---------------------------------------------------------------------------

/// Innermost service of the pipeline: invokes the operation with the
/// invocation's signal.
///
/// Success and cancellation are responses; a failure becomes
/// `RunError::Operation` with the cause intact.
pub struct OperationService<O: ?Sized> {
    op: Arc<O>,
}

impl<O: Operation + ?Sized> OperationService<O> {
    #[must_use]
    pub fn new(op: Arc<O>) -> Self {
        Self { op }
    }
}

impl<O: ?Sized> Clone for OperationService<O> {
    fn clone(&self) -> Self {
        Self {
            op: Arc::clone(&self.op),
        }
    }
}

impl<O> Service<Invocation> for OperationService<O>
where
    O: Operation + ?Sized + 'static,
{
    type Response = Outcome;
    type Error = RunError;
    type Future = RunFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, inv: Invocation) -> Self::Future {
        let op = Arc::clone(&self.op);
        Box::pin(async move {
            match op.run(&inv.cancel).await {
                Ok(()) => Ok(Outcome::Success),
                Err(OpError::Cancelled) => Ok(Outcome::Cancelled),
                Err(err) => Err(RunError::Operation(err)),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
