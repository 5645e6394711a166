use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use sentinel_common::Result;

use super::builder::SentinelRuntime;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub steps_completed: u64,
    pub interrupted: bool,
    pub ledger_len: usize,
    pub proposals: usize,
    pub dropped: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub validation_failures: usize,
    pub update_failures: usize,
}

/// Runs steps until the configured count is reached or `shutdown` flips.
///
/// A zero step count means run until interrupted. Fatal step errors end the
/// run and propagate.
pub async fn run_simulation(runtime: &mut SentinelRuntime, mut shutdown: watch::Receiver<bool>) -> Result<SimulationSummary> {
    let limit = runtime.config.steps;
    let interval = Duration::from_millis(runtime.config.step_interval_ms);
    let mut summary = SimulationSummary::default();
    let mut shutdown_open = true;

    info!(
        "▶️ Simulation started ({} steps, {} ms apart)",
        if limit == 0 { "unbounded".to_string() } else { limit.to_string() },
        interval.as_millis()
    );

    loop {
        if limit != 0 && summary.steps_completed >= limit {
            break;
        }
        if *shutdown.borrow() {
            summary.interrupted = true;
            break;
        }

        let report = runtime.scheduler.run_step(&shutdown).await?;
        summary.proposals += report.proposals;
        summary.dropped += report.dropped;
        summary.accepted += report.accepted.len();
        summary.rejected += report.rejected.len();
        summary.validation_failures += report.validation_failures;
        summary.update_failures += report.update_failures;

        if !report.is_completed() {
            summary.interrupted = true;
            break;
        }
        summary.steps_completed += 1;

        let finished = limit != 0 && summary.steps_completed >= limit;
        if finished || interval.is_zero() {
            continue;
        }
        if shutdown_open {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("⚠️ Shutdown channel closed; only the step limit can end this run");
                        shutdown_open = false;
                    }
                }
            }
        } else {
            tokio::time::sleep(interval).await;
        }
    }

    summary.ledger_len = runtime.ledger.len()?;
    info!(
        "🏁 Simulation finished: {} steps, {} signatures in ledger, {} accepted, {} rejected{}",
        summary.steps_completed,
        summary.ledger_len,
        summary.accepted,
        summary.rejected,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
    Ok(summary)
}
