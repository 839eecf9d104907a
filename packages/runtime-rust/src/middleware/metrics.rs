//! Metrics middleware for invocations.
//!
//! Records invocation duration and outcome on a `tracing` span and feeds the
//! `metrics` facade:
//!
//! - `opchain_operations_total{outcome}`: counter
//! - `opchain_operation_duration_ms`: histogram
//!
//! With no recorder installed the `metrics` calls are no-ops.

use std::task::{Context, Poll};
use std::time::Instant;

use opchain_core::Outcome;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::invocation::{result_label, Invocation, RunError};
use crate::service::RunFuture;

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments invocations with timing and counting.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records invocation duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Invocation> for MetricsService<S>
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
        let call_id = inv.call_id;
        let name = inv.name.clone();

        let span = info_span!(
            "operation",
            name = %name,
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(inv);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let duration_ms = start.elapsed().as_millis();
                let outcome = result_label(&result);

                #[allow(clippy::cast_possible_truncation)]
                let duration_u64 = duration_ms as u64;
                tracing::Span::current().record("duration_ms", duration_u64);
                tracing::Span::current().record("outcome", outcome);

                #[allow(clippy::cast_precision_loss)]
                let duration_f64 = duration_u64 as f64;
                metrics::counter!("opchain_operations_total", "outcome" => outcome).increment(1);
                metrics::histogram!("opchain_operation_duration_ms").record(duration_f64);

                match &result {
                    Err(err) => tracing::info!(
                        name = %name,
                        call_id = call_id,
                        duration_ms = duration_u64,
                        outcome = outcome,
                        error = %err,
                        "operation complete"
                    ),
                    Ok(_) => tracing::info!(
                        name = %name,
                        call_id = call_id,
                        duration_ms = duration_u64,
                        outcome = outcome,
                        "operation complete"
                    ),
                }

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use opchain_core::{fail, noop};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::service::OperationService;

    #[tokio::test]
    async fn metrics_layer_passes_through_response() {
        let svc = MetricsLayer.layer(OperationService::new(Arc::new(noop())));
        let inv = Invocation::new(42, "fade-in", CancellationToken::new());

        let resp = svc.oneshot(inv).await.unwrap();
        assert_eq!(resp, Outcome::Success);
    }

    #[tokio::test]
    async fn metrics_layer_passes_through_error() {
        let svc = MetricsLayer.layer(OperationService::new(Arc::new(fail(anyhow::anyhow!("E")))));
        let inv = Invocation::new(7, "slide", CancellationToken::new());

        let err = svc.oneshot(inv).await.unwrap_err();
        assert!(matches!(err, RunError::Operation(_)));
    }
}
