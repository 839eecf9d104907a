//! Graceful shutdown controller with in-flight run tracking.
//!
//! Uses `ArcSwap` for lock-free state transitions, a root
//! [`CancellationToken`] every run signal descends from, and an atomic
//! counter with RAII guards for in-flight tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;

/// Runner state, transitioned by the shutdown controller.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Not yet accepting runs.
    Starting,
    /// Accepting runs.
    Ready,
    /// Shutdown requested; in-flight runs have been signalled, new runs are rejected.
    Draining,
    /// Every in-flight run has settled.
    Stopped,
}

/// Coordinates shutdown for a runner.
///
/// 1. The runner checks `state()` before accepting a run
/// 2. Each run receives a child of `root_token()`
/// 3. `trigger_shutdown()` moves to Draining and cancels the root, which
///    signals every in-flight run at once
/// 4. `wait_for_drain()` waits until in-flight runs settle
#[derive(Debug)]
pub struct ShutdownController {
    root: CancellationToken,
    in_flight: Arc<AtomicU64>,
    state: Arc<ArcSwap<RunnerState>>,
}

impl ShutdownController {
    /// Creates a new shutdown controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            in_flight: Arc::new(AtomicU64::new(0)),
            state: Arc::new(ArcSwap::from_pointee(RunnerState::Starting)),
        }
    }

    /// Transitions to the `Ready` state.
    pub fn set_ready(&self) {
        self.state.store(Arc::new(RunnerState::Ready));
    }

    /// The token every run signal is derived from.
    #[must_use]
    pub fn root_token(&self) -> &CancellationToken {
        &self.root
    }

    /// A fresh signal for one run. Cancelled when shutdown is triggered,
    /// but cancelling it never affects the root or sibling runs.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Initiates graceful shutdown.
    ///
    /// Transitions to `Draining` and cancels the root token. Idempotent.
    pub fn trigger_shutdown(&self) {
        if self.state() == RunnerState::Stopped {
            return;
        }
        self.state.store(Arc::new(RunnerState::Draining));
        self.root.cancel();
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RunnerState {
        **self.state.load()
    }

    /// Returns a shared handle to the state.
    #[must_use]
    pub fn state_handle(&self) -> Arc<ArcSwap<RunnerState>> {
        Arc::clone(&self.state)
    }

    /// Creates an RAII guard that tracks an in-flight run.
    ///
    /// The counter is incremented on creation and decremented when the guard
    /// is dropped, even if the run panics.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Returns the current number of in-flight runs.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Waits for all in-flight runs to settle, up to the given timeout.
    ///
    /// Returns `true` if everything drained (transitions to `Stopped`).
    /// Returns `false` if the timeout expired (state remains `Draining`).
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.in_flight.load(Ordering::Relaxed) == 0 {
                self.state.store(Arc::new(RunnerState::Stopped));
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    in_flight = self.in_flight_count(),
                    "drain timed out with runs still in flight"
                );
                return false;
            }

            // Poll at 10ms intervals to avoid busy-waiting
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
