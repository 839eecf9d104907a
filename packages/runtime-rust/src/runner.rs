//! Host that owns cancellation for top-level runs.
//!
//! Each run gets a child of the runner's root signal, flows through the
//! middleware pipeline, and is counted in flight until it settles. Shutdown
//! cancels the root, so every in-flight run observes cancellation at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use opchain_core::{Operation, Outcome};
use tower::ServiceExt;

use crate::config::RunnerConfig;
use crate::invocation::{Invocation, RunError};
use crate::middleware::{build_pipeline, LoadShedLayer};
use crate::service::OperationService;
use crate::shutdown::{RunnerState, ShutdownController};

/// Runs composed operations under a shared concurrency limit and shutdown signal.
#[derive(Debug)]
pub struct Runner {
    config: Arc<RunnerConfig>,
    shutdown: ShutdownController,
    load_shed: LoadShedLayer,
    next_call_id: AtomicU64,
}

impl Runner {
    /// Creates a runner that is immediately `Ready`.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let shutdown = ShutdownController::new();
        let load_shed = LoadShedLayer::new(config.max_concurrent_operations);
        shutdown.set_ready();

        Self {
            config: Arc::new(config),
            shutdown,
            load_shed,
            next_call_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.shutdown.state()
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.shutdown.in_flight_count()
    }

    /// Run `op` under the configured default deadline.
    ///
    /// # Errors
    ///
    /// See [`Runner::run_with_timeout`].
    pub async fn run<O>(&self, op: Arc<O>) -> Result<Outcome, RunError>
    where
        O: Operation + ?Sized + 'static,
    {
        self.run_named("operation", op).await
    }

    /// Like [`Runner::run`], labelling spans and logs with `name`.
    ///
    /// # Errors
    ///
    /// See [`Runner::run_with_timeout`].
    pub async fn run_named<O>(&self, name: &str, op: Arc<O>) -> Result<Outcome, RunError>
    where
        O: Operation + ?Sized + 'static,
    {
        let timeout_ms = self.config.default_timeout_ms;
        self.run_with_timeout(name, op, timeout_ms).await
    }

    /// Run `op` with an explicit deadline (`None` disables it).
    ///
    /// Success and cancellation are `Ok`.
    ///
    /// # Errors
    ///
    /// - `RunError::ShuttingDown` if the runner is no longer `Ready`
    /// - `RunError::Overloaded` if the concurrency limit is reached
    /// - `RunError::Timeout` if the deadline expired
    /// - `RunError::Operation` if the operation failed
    pub async fn run_with_timeout<O>(
        &self,
        name: &str,
        op: Arc<O>,
        timeout_ms: Option<u64>,
    ) -> Result<Outcome, RunError>
    where
        O: Operation + ?Sized + 'static,
    {
        if self.shutdown.state() != RunnerState::Ready {
            tracing::debug!(name, "run rejected: runner not ready");
            return Err(RunError::ShuttingDown);
        }

        let _guard = self.shutdown.in_flight_guard();
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let inv = Invocation::new(call_id, name, self.shutdown.child_token())
            .with_timeout_ms(timeout_ms);

        build_pipeline(OperationService::new(op), self.load_shed.clone())
            .oneshot(inv)
            .await
    }

    /// Stop accepting runs and signal every in-flight run.
    pub fn trigger_shutdown(&self) {
        tracing::info!(in_flight = self.in_flight_count(), "shutdown triggered");
        self.shutdown.trigger_shutdown();
    }

    /// Trigger shutdown, then wait up to `drain_timeout_ms` for in-flight runs.
    ///
    /// Returns `true` if every run settled in time.
    pub async fn shutdown(&self) -> bool {
        self.trigger_shutdown();
        let drained = self.shutdown.wait_for_drain(self.config.drain_timeout()).await;
        if drained {
            tracing::info!("runner stopped");
        }
        drained
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
