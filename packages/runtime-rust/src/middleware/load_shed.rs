//! Load-shedding middleware for invocations.
//!
//! Rejects invocations when the runner is overloaded (concurrent count exceeds
//! `max_concurrent_operations`) with `RunError::Overloaded`.

use std::sync::Arc;
use std::task::{Context, Poll};

use opchain_core::Outcome;
use tokio::sync::Semaphore;
use tower::{Layer, Service};

use crate::invocation::{Invocation, RunError};
use crate::service::RunFuture;

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

/// Tower layer that limits concurrent invocations via a semaphore.
///
/// When all permits are taken, incoming invocations are rejected immediately
/// with `RunError::Overloaded` rather than queued. Clones share the same
/// semaphore, so one layer bounds every pipeline built from it.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    semaphore: Arc<Semaphore>,
}

impl LoadShedLayer {
    /// Create a new `LoadShedLayer` with the given concurrency limit.
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            semaphore: self.semaphore.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces a concurrency limit via semaphore-based backpressure.
#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    semaphore: Arc<Semaphore>,
}

impl<S> Service<Invocation> for LoadShedService<S>
where
    S: Service<Invocation, Response = Outcome, Error = RunError> + Send,
    S::Future: Send + 'static,
{
    type Response = Outcome;
    type Error = RunError;
    type Future = RunFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, inv: Invocation) -> Self::Future {
        // Try to acquire a permit without waiting. If none available, reject.
        let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
            tracing::warn!(call_id = inv.call_id, name = %inv.name, "invocation rejected: overloaded");
            return Box::pin(async { Err(RunError::Overloaded) });
        };

        let fut = self.inner.call(inv);
        Box::pin(async move {
            // Hold the permit for the duration of the invocation.
            let result = fut.await;
            drop(permit);
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use opchain_core::delay;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::service::OperationService;

    fn slow_service(delay_ms: u64) -> OperationService<opchain_core::Delay> {
        OperationService::new(Arc::new(delay(Duration::from_millis(delay_ms))))
    }

    fn make_inv() -> Invocation {
        Invocation::new(1, "test", CancellationToken::new())
    }

    #[tokio::test]
    async fn allows_invocations_under_limit() {
        let layer = LoadShedLayer::new(10);
        let svc = layer.layer(slow_service(1));
        let resp = svc.oneshot(make_inv()).await.unwrap();
        assert_eq!(resp, Outcome::Success);
        assert_eq!(layer.available(), 10);
    }

    #[tokio::test]
    async fn rejects_when_overloaded() {
        let layer = LoadShedLayer::new(1);
        let mut svc = layer.layer(slow_service(500));

        // First invocation acquires the single permit.
        let _ = ServiceExt::ready(&mut svc).await.unwrap();
        let _in_flight = tokio::spawn({
            let fut = svc.call(make_inv());
            async move { fut.await }
        });

        // Give the spawned task time to acquire the permit.
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Second invocation should be rejected immediately.
        let err = svc.call(make_inv()).await.unwrap_err();
        assert!(matches!(err, RunError::Overloaded));
    }
}
