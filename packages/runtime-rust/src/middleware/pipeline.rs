//! Pipeline composition: combines all middleware layers into a single service stack.

use opchain_core::{Operation, Outcome};
use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::invocation::{Invocation, RunError};
use crate::service::{OperationService, RunFuture};

/// Build the run pipeline by wrapping an `OperationService` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `TimeoutLayer` -- enforce per-invocation deadlines
/// 3. `MetricsLayer` -- record timing and outcome (closest to the operation)
///
/// `load_shed` is passed in rather than built here so that every pipeline
/// created by one runner shares a single concurrency limit.
#[must_use]
pub fn build_pipeline<O>(
    service: OperationService<O>,
    load_shed: LoadShedLayer,
) -> impl tower::Service<Invocation, Response = Outcome, Error = RunError, Future = RunFuture>
       + Clone
       + Send
where
    O: Operation + ?Sized + 'static,
{
    ServiceBuilder::new()
        .layer(load_shed)
        .layer(TimeoutLayer)
        .layer(MetricsLayer)
        .service(service)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use opchain_core::{delay, sequence, OperationExt, SharedOperation};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pipeline_runs_through_all_layers() {
        let op: SharedOperation = sequence![
            delay(Duration::from_millis(10)),
            delay(Duration::from_millis(20)),
        ]
        .shared();
        let svc = build_pipeline(OperationService::new(op), LoadShedLayer::new(4));

        let inv = Invocation::new(42, "chain", CancellationToken::new()).with_timeout_ms(Some(5000));
        let resp = svc.oneshot(inv).await.unwrap();
        assert_eq!(resp, Outcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn pipeline_reports_timeout() {
        let svc = build_pipeline(
            OperationService::new(Arc::new(delay(Duration::from_secs(30)))),
            LoadShedLayer::new(4),
        );

        let inv = Invocation::new(1, "slow", CancellationToken::new()).with_timeout_ms(Some(100));
        let err = svc.oneshot(inv).await.unwrap_err();
        assert!(matches!(err, RunError::Timeout { timeout_ms: 100 }));
    }
}
