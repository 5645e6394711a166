use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;

use sentinel_agent::{Agent, CentroidModel, SyntheticTraffic};
use sentinel_common::{AgentId, Participant, Result};
use sentinel_consensus::{FanoutSink, MemorySink, ObservabilitySink, Scheduler, TracingSink};
use sentinel_ledger::{Ledger, MemoryBackend};

use crate::config::Config;

/// Everything a run needs, wired from one [`Config`].
pub struct SentinelRuntime {
    pub config: Config,
    pub ledger: Arc<Ledger>,
    pub scheduler: Scheduler,
    /// Copy of every step report, for the end-of-run summary and audit.
    pub reports: Arc<MemorySink>,
}

pub async fn build_runtime(config: Config) -> Result<SentinelRuntime> {
    config.validate()?;

    let ledger = if config.in_memory {
        info!("🧠 Using an in-memory ledger");
        Ledger::with_backend(Arc::new(MemoryBackend::new()), config.retry_policy())
    } else {
        info!("💾 Opening ledger under {}", config.data_dir);
        Ledger::open(&config.data_dir, config.retry_policy()).await?
    };
    let ledger = Arc::new(ledger);

    let participants = build_agents(&config);

    let reports = Arc::new(MemorySink::new());
    let sinks: Vec<Arc<dyn ObservabilitySink>> = vec![Arc::new(TracingSink), reports.clone()];
    let mut scheduler = Scheduler::new(Arc::clone(&ledger), participants, config.scheduler_config())?
        .with_sink(Arc::new(FanoutSink(sinks)));
    // A reopened ledger was decided by the run that wrote it
    scheduler.resume_from(ledger.last_id()?).await;

    info!(
        "✅ Runtime built: {} agents, seed {}, {} features per row",
        config.agents, config.seed, config.traffic.feature_dim
    );
    Ok(SentinelRuntime { config, ledger, scheduler, reports })
}

/// One agent per configured slot, ids starting at 1, each with its own
/// traffic stream derived from the run seed.
pub fn build_agents(config: &Config) -> Vec<Box<dyn Participant>> {
    let mut seeds = StdRng::seed_from_u64(config.seed);
    let prior = config.anomaly_prior();

    (1..=config.agents)
        .map(|n| {
            let traffic = SyntheticTraffic::new(
                seeds.gen(),
                config.traffic.feature_dim,
                config.traffic.batch_size,
                config.traffic.anomaly_rate,
            )
            .with_magnitude(config.traffic.anomaly_magnitude);
            let model = CentroidModel::uniform_baseline(config.traffic.feature_dim, config.agent.row_cutoff)
                .with_prior(prior.clone());

            let agent = Agent::new(
                AgentId(n as u32),
                config.agent.agent_config(),
                Box::new(model),
                Box::new(traffic),
            );
            Box::new(agent) as Box<dyn Participant>
        })
        .collect()
}
