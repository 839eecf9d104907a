//! `opchain`: run a sequence or parallel group of delay steps.
//!
//! ```text
//! opchain --mode parallel --steps-ms 100,250,50 --fail-at 2 --json
//! ```
//!
//! Ctrl-C cancels the run cooperatively.

use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use opchain_runtime::demo::{DemoPlan, Mode, RunSummary};
use opchain_runtime::{init_tracing, LogConfig, Runner, RunnerConfig};

#[derive(Debug, Parser)]
#[command(name = "opchain", version, about = "Compose and run cancellable delay steps")]
struct Cli {
    /// How to combine the steps.
    #[arg(long, value_enum, default_value_t = Mode::Sequence, env = "OPCHAIN_MODE")]
    mode: Mode,

    /// Comma-separated step delays in milliseconds.
    #[arg(long, value_delimiter = ',', default_value = "100,250,50", env = "OPCHAIN_STEPS_MS")]
    steps_ms: Vec<u64>,

    /// Make the step at this index fail after its delay.
    #[arg(long, env = "OPCHAIN_FAIL_AT")]
    fail_at: Option<usize>,

    /// Deadline for the whole run.
    #[arg(long, env = "OPCHAIN_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// How long shutdown waits for the run to settle.
    #[arg(long, default_value_t = 5_000, env = "OPCHAIN_DRAIN_TIMEOUT_MS")]
    drain_timeout_ms: u64,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "OPCHAIN_LOG")]
    log_level: String,

    /// Print the summary and logs as JSON.
    #[arg(long, env = "OPCHAIN_JSON")]
    json: bool,
}

impl Cli {
    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            default_timeout_ms: self.timeout_ms,
            drain_timeout_ms: self.drain_timeout_ms,
            log: LogConfig {
                level: self.log_level.clone(),
                json: self.json,
            },
            ..RunnerConfig::default()
        }
    }

    fn plan(&self) -> DemoPlan {
        DemoPlan {
            mode: self.mode,
            steps_ms: self.steps_ms.clone(),
            fail_at: self.fail_at,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.runner_config();
    init_tracing(&config.log);

    let plan = cli.plan();
    let op = plan.build()?;
    let runner = Arc::new(Runner::new(config));

    tokio::spawn({
        let runner = Arc::clone(&runner);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                runner.trigger_shutdown();
            }
        }
    });

    let start = tokio::time::Instant::now();
    let result = runner.run_named("demo", op).await;
    let summary = RunSummary::new(&plan, &result, start.elapsed());

    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "{} {} step(s): {} in {}ms",
            match summary.mode {
                Mode::Sequence => "sequence of",
                Mode::Parallel => "parallel group of",
            },
            summary.steps,
            summary.outcome,
            summary.elapsed_ms
        );
    }

    if !runner.shutdown().await {
        tracing::warn!("run did not settle before the drain timeout");
    }

    if let Some(error) = summary.error {
        bail!(error);
    }
    Ok(())
}
