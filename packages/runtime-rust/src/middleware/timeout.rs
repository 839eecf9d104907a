//! Timeout middleware for invocations.
//!
//! The deadline is enforced cooperatively: the inner service receives a child
//! of the invocation's signal, and that child is cancelled when the deadline
//! passes. The layer still waits for the operation to settle, then reports
//! `RunError::Timeout`. Invocations without `timeout_ms` pass straight through.

use std::task::{Context, Poll};
use std::time::Duration;

use opchain_core::Outcome;
use tower::{Layer, Service};

use crate::invocation::{Invocation, RunError};
use crate::service::RunFuture;

// ---------------------------------------------------------------------------
// TimeoutLayer
// ---------------------------------------------------------------------------

/// Tower layer that wraps services with per-invocation deadline enforcement.
///
/// The timeout is read from each invocation's `timeout_ms` field, allowing
/// different invocations to have different deadlines.
#[derive(Debug, Clone)]
pub struct TimeoutLayer;

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService { inner }
    }
}

// ---------------------------------------------------------------------------
// TimeoutService
// ---------------------------------------------------------------------------

/// Service wrapper that enforces per-invocation deadlines.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
}

impl<S> Service<Invocation> for TimeoutService<S>
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

    fn call(&mut self, mut inv: Invocation) -> Self::Future {
        let Some(timeout_ms) = inv.timeout_ms else {
            return Box::pin(self.inner.call(inv));
        };

        let deadline = inv.cancel.child_token();
        inv.cancel = deadline.clone();
        let call_id = inv.call_id;
        let fut = self.inner.call(inv);

        Box::pin(async move {
            let sleep = tokio::time::sleep(Duration::from_millis(timeout_ms));
            tokio::pin!(fut);
            tokio::pin!(sleep);

            let mut expired = false;
            let result = loop {
                tokio::select! {
                    result = &mut fut => break result,
                    () = &mut sleep, if !expired => {
                        tracing::debug!(call_id, timeout_ms, "deadline passed, cancelling operation");
                        expired = true;
                        deadline.cancel();
                    }
                }
            };

            if expired {
                Err(RunError::Timeout { timeout_ms })
            } else {
                result
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use opchain_core::{delay, from_fn, OpError, OperationExt};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::service::OperationService;

    fn make_inv(timeout_ms: Option<u64>) -> Invocation {
        Invocation::new(1, "test", CancellationToken::new()).with_timeout_ms(timeout_ms)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_within_timeout() {
        let svc = TimeoutLayer.layer(OperationService::new(Arc::new(delay(Duration::from_millis(10)))));
        let resp = svc.oneshot(make_inv(Some(1000))).await.unwrap();
        assert_eq!(resp, Outcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn exceeds_timeout_returns_error() {
        let svc = TimeoutLayer.layer(OperationService::new(Arc::new(delay(Duration::from_secs(60)))));
        let err = svc.oneshot(make_inv(Some(50))).await.unwrap_err();
        assert!(matches!(err, RunError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test(start_paused = true)]
    async fn no_timeout_passes_through() {
        let svc = TimeoutLayer.layer(OperationService::new(Arc::new(delay(Duration::from_secs(60)))));
        let resp = svc.oneshot(make_inv(None)).await.unwrap();
        assert_eq!(resp, Outcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_operation_cooperatively() {
        let cancelled = Arc::new(AtomicU32::new(0));
        let op = delay(Duration::from_secs(60)).on_cancel({
            let cancelled = cancelled.clone();
            move || {
                cancelled.fetch_add(1, Ordering::SeqCst);
            }
        });

        let svc = TimeoutLayer.layer(OperationService::new(Arc::new(op)));
        let err = svc.oneshot(make_inv(Some(20))).await.unwrap_err();

        assert!(matches!(err, RunError::Timeout { timeout_ms: 20 }));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_does_not_cancel_caller_signal() {
        let caller = CancellationToken::new();
        let op = from_fn(|cancel: CancellationToken| async move {
            cancel.cancelled().await;
            Err(OpError::Cancelled)
        });

        let svc = TimeoutLayer.layer(OperationService::new(Arc::new(op)));
        let inv = Invocation::new(1, "test", caller.clone()).with_timeout_ms(Some(5));
        let _ = svc.oneshot(inv).await;

        assert!(!caller.is_cancelled());
    }
}
