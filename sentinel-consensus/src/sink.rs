use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::scheduler::{StepOutcome, StepReport};

/// Receives one report per finished (or aborted) step.
pub trait ObservabilitySink: Send + Sync {
    fn emit(&self, report: &StepReport);
}

/// Writes reports as structured events on the `consensus` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn emit(&self, report: &StepReport) {
        match &report.outcome {
            StepOutcome::Completed => info!(
                "📊 Step {} done in {} ms: {} proposed, {} appended, {} accepted, {} rejected",
                report.step,
                report.elapsed_ms,
                report.proposals,
                report.appended.len(),
                report.accepted.len(),
                report.rejected.len()
            ),
            StepOutcome::Aborted { phase } => {
                warn!("🛑 Step {} aborted before {} after {} ms", report.step, phase, report.elapsed_ms)
            }
        }

        match serde_json::to_string(report) {
            Ok(json) => tracing::info!(target: "consensus", "EVENT:STEP {}", json),
            Err(e) => warn!("⚠️ Could not serialize step report {}: {}", report.step, e),
        }
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<StepReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<StepReport> {
        self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn last(&self) -> Option<StepReport> {
        self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).last().cloned()
    }
}

impl ObservabilitySink for MemorySink {
    fn emit(&self, report: &StepReport) {
        self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(report.clone());
    }
}

/// Forwards every report to each inner sink in order.
pub struct FanoutSink(pub Vec<Arc<dyn ObservabilitySink>>);

impl ObservabilitySink for FanoutSink {
    fn emit(&self, report: &StepReport) {
        for sink in &self.0 {
            sink.emit(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Phase;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.emit(&StepReport::new(1));
        let mut aborted = StepReport::new(2);
        aborted.outcome = StepOutcome::Aborted { phase: Phase::Validate };
        sink.emit(&aborted);

        let reports = sink.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].step, 1);
        assert_eq!(sink.last().unwrap().outcome, StepOutcome::Aborted { phase: Phase::Validate });
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let sinks: Vec<Arc<dyn ObservabilitySink>> = vec![a.clone(), b.clone(), Arc::new(TracingSink)];
        let fanout = FanoutSink(sinks);

        fanout.emit(&StepReport::new(1));
        assert_eq!(a.reports().len(), 1);
        assert_eq!(b.reports().len(), 1);
    }
}
