//! Composite built from command-line flags for the `opchain` binary.

use std::time::Duration;

use anyhow::bail;
use opchain_core::{
    delay, fail, parallel, sequence, then, OperationExt, Outcome, SharedOperation,
};
use serde::Serialize;

use crate::invocation::{result_label, RunError};

/// How the steps are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Sequence,
    Parallel,
}

/// Delay steps plus an optional failing step.
#[derive(Debug, Clone)]
pub struct DemoPlan {
    pub mode: Mode,
    pub steps_ms: Vec<u64>,
    /// Index of the step that fails after its delay.
    pub fail_at: Option<usize>,
}

impl DemoPlan {
    /// Build the composite.
    ///
    /// # Errors
    ///
    /// Returns an error if `fail_at` does not name a step.
    pub fn build(&self) -> anyhow::Result<SharedOperation> {
        if let Some(index) = self.fail_at {
            if index >= self.steps_ms.len() {
                bail!(
                    "--fail-at {index} is out of range for {} step(s)",
                    self.steps_ms.len()
                );
            }
        }

        let steps = self
            .steps_ms
            .iter()
            .enumerate()
            .map(|(index, &ms)| self.step(index, ms));

        Ok(match self.mode {
            Mode::Sequence => sequence(steps).shared(),
            Mode::Parallel => parallel(steps).shared(),
        })
    }

    fn step(&self, index: usize, ms: u64) -> SharedOperation {
        let wait = delay(Duration::from_millis(ms));
        let body = if self.fail_at == Some(index) {
            then(wait, fail(anyhow::anyhow!("step {index} failed"))).shared()
        } else {
            wait.shared()
        };

        body.on_before(move || tracing::debug!(step = index, delay_ms = ms, "step started"))
            .on_success(move || tracing::debug!(step = index, "step succeeded"))
            .shared()
    }
}

/// What the binary prints once the run settles.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub steps: usize,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    #[must_use]
    pub fn new(plan: &DemoPlan, result: &Result<Outcome, RunError>, elapsed: Duration) -> Self {
        Self {
            mode: plan.mode,
            steps: plan.steps_ms.len(),
            outcome: result_label(result),
            error: result.as_ref().err().map(ToString::to_string),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether the run ended in success or cancellation.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
