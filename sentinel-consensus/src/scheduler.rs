use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use sentinel_common::{AgentId, Participant, Result, SentinelError, SignatureRecord, ValidationVote};
use sentinel_ledger::Ledger;

use crate::consensus::{ConsensusEvaluator, QuorumPolicy, VoteOutcome, VoteRegistry};
use crate::sink::{ObservabilitySink, TracingSink};

/// An agent as the scheduler holds it: read-locked while validating,
/// write-locked while proposing, advancing or applying.
pub type SharedParticipant = Arc<RwLock<Box<dyn Participant>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Propose,
    Collect,
    Validate,
    Resolve,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Propose => "propose",
            Phase::Collect => "collect",
            Phase::Validate => "validate",
            Phase::Resolve => "resolve",
            Phase::Apply => "apply",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Completed,
    /// Shutdown was observed before `phase` started.
    Aborted { phase: Phase },
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: u64,
    pub outcome: StepOutcome,
    /// Candidates returned by `propose`.
    pub proposals: usize,
    /// Ledger ids of the candidates that made it in, in append order.
    pub appended: Vec<u64>,
    /// Candidates lost to append failures.
    pub dropped: usize,
    pub votes_cast: usize,
    pub validation_failures: usize,
    pub accepted: Vec<u64>,
    pub rejected: Vec<u64>,
    pub update_failures: usize,
    pub elapsed_ms: u64,
}

impl StepReport {
    pub fn new(step: u64) -> Self {
        Self {
            step,
            outcome: StepOutcome::Completed,
            proposals: 0,
            appended: Vec::new(),
            dropped: 0,
            votes_cast: 0,
            validation_failures: 0,
            accepted: Vec::new(),
            rejected: Vec::new(),
            update_failures: 0,
            elapsed_ms: 0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == StepOutcome::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub quorum: QuorumPolicy,
    /// Upper bound on validations running at once on the blocking pool.
    pub validation_workers: usize,
    /// Populations at least this large validate in parallel.
    pub parallel_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { quorum: QuorumPolicy::default(), validation_workers: 4, parallel_threshold: 8 }
    }
}

/// Votes one agent cast in a step.
#[derive(Debug, Default)]
struct Ballot {
    votes: Vec<ValidationVote>,
    failures: usize,
}

impl Ballot {
    fn cast(participant: &dyn Participant, records: &[SignatureRecord]) -> Self {
        let agent_id = participant.agent_id();
        let mut ballot = Ballot { votes: Vec::with_capacity(records.len()), failures: 0 };

        for record in records {
            let vote = match panic::catch_unwind(AssertUnwindSafe(|| participant.validate(record))) {
                Ok(Ok(vote)) => ValidationVote { agent_id, signature_id: record.id, ..vote },
                Ok(Err(e)) => {
                    warn!("⚠️ {} failed to validate signature {}: {}. Counting a reject.", agent_id, record.id, e);
                    ballot.failures += 1;
                    ValidationVote::fail_safe(agent_id, record.id)
                }
                Err(_) => {
                    warn!("💥 {} panicked validating signature {}. Counting a reject.", agent_id, record.id);
                    ballot.failures += 1;
                    ValidationVote::fail_safe(agent_id, record.id)
                }
            };
            ballot.votes.push(vote);
        }
        ballot
    }

    fn fail_safe(agent_id: AgentId, records: &[SignatureRecord]) -> Self {
        Ballot {
            votes: records.iter().map(|r| ValidationVote::fail_safe(agent_id, r.id)).collect(),
            failures: records.len(),
        }
    }
}

/// Drives agents through propose, collect, validate, resolve and apply.
pub struct Scheduler {
    ledger: Arc<Ledger>,
    agents: Vec<SharedParticipant>,
    evaluator: ConsensusEvaluator,
    config: SchedulerConfig,
    workers: Arc<Semaphore>,
    decided: HashSet<u64>,
    /// Every id at or below this was decided by an earlier run.
    decided_through: u64,
    sink: Arc<dyn ObservabilitySink>,
    step: u64,
}

impl Scheduler {
    pub fn new(ledger: Arc<Ledger>, participants: Vec<Box<dyn Participant>>, config: SchedulerConfig) -> Result<Self> {
        let evaluator = ConsensusEvaluator::new(config.quorum.clone())?;
        if config.validation_workers == 0 {
            return Err(SentinelError::Config("validation_workers must be at least 1".into()));
        }

        let mut participants = participants;
        participants.sort_by_key(|p| p.agent_id());
        if let Some(pair) = participants.windows(2).find(|w| w[0].agent_id() == w[1].agent_id()) {
            return Err(SentinelError::Config(format!("duplicate agent id {}", pair[0].agent_id())));
        }

        info!(
            "🧭 Scheduler ready: {} agents, threshold {} (inclusive: {}), {} validation workers",
            participants.len(),
            config.quorum.threshold,
            config.quorum.inclusive,
            config.validation_workers
        );

        Ok(Self {
            ledger,
            agents: participants.into_iter().map(|p| Arc::new(RwLock::new(p))).collect(),
            evaluator,
            workers: Arc::new(Semaphore::new(config.validation_workers)),
            config,
            decided: HashSet::new(),
            decided_through: 0,
            sink: Arc::new(TracingSink),
            step: 0,
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObservabilitySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Agents in ascending id order.
    pub fn agents(&self) -> &[SharedParticipant] {
        &self.agents
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn steps_run(&self) -> u64 {
        self.step
    }

    pub fn is_decided(&self, signature_id: u64) -> bool {
        signature_id <= self.decided_through || self.decided.contains(&signature_id)
    }

    /// Treats the ledger up to `ledger_id` as already decided and moves every
    /// agent's watermark past it. Used when reopening a persisted ledger.
    pub async fn resume_from(&mut self, ledger_id: u64) {
        self.decided_through = self.decided_through.max(ledger_id);
        for agent in &self.agents {
            agent.write().await.advance_seen(ledger_id);
        }
        if ledger_id > 0 {
            info!("⏩ Resuming after signature {}; earlier records stay decided", ledger_id);
        }
    }

    /// Runs one full step.
    ///
    /// `shutdown` is checked before propose, collect and validate. Resolve
    /// and apply always follow a finished validate so watermarks never get
    /// ahead of decisions. Records appended before an abort stay in the
    /// ledger and are picked up by the next step.
    pub async fn run_step(&mut self, shutdown: &watch::Receiver<bool>) -> Result<StepReport> {
        let started = Instant::now();
        self.step += 1;
        let mut report = StepReport::new(self.step);
        debug!("⏱️ Step {} starting", self.step);

        // Propose
        if *shutdown.borrow() {
            return Ok(self.finish_aborted(report, Phase::Propose, started));
        }
        for agent in &self.agents {
            let draft = agent.write().await.propose();
            let Some(draft) = draft else {
                continue;
            };
            report.proposals += 1;

            let origin = draft.origin;
            match self.ledger.append(draft).await {
                Ok(id) => {
                    info!("📥 {} proposed signature {}", origin, id);
                    report.appended.push(id);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("⚠️ Dropping proposal from {}: {}", origin, e);
                    report.dropped += 1;
                }
            }
        }

        // Collect
        if *shutdown.borrow() {
            return Ok(self.finish_aborted(report, Phase::Collect, started));
        }
        let mut shown: Vec<Arc<Vec<SignatureRecord>>> = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            let seen = agent.read().await.last_seen_ledger_id();
            match self.ledger.read_since(seen).await {
                Ok(records) => shown.push(Arc::new(records)),
                Err(e) => {
                    error!("❌ Step {} cannot read the ledger: {}", self.step, e);
                    return Err(e);
                }
            }
        }

        // Validate
        if *shutdown.borrow() {
            return Ok(self.finish_aborted(report, Phase::Validate, started));
        }
        let ballots = if self.agents.len() >= self.config.parallel_threshold {
            self.validate_parallel(&shown).await?
        } else {
            self.validate_sequential(&shown).await
        };
        for (agent, records) in self.agents.iter().zip(&shown) {
            if let Some(max_id) = records.iter().map(|r| r.id).max() {
                agent.write().await.advance_seen(max_id);
            }
        }

        // Resolve
        let mut registry = VoteRegistry::new();
        for ballot in ballots {
            report.validation_failures += ballot.failures;
            for vote in ballot.votes {
                report.votes_cast += 1;
                if self.is_decided(vote.signature_id) {
                    continue;
                }
                let (agent_id, signature_id) = (vote.agent_id, vote.signature_id);
                if let VoteOutcome::Conflict { kept } = registry.register_vote(vote) {
                    warn!("⚠️ {} voted twice on signature {}; keeping {}", agent_id, signature_id, kept);
                }
            }
        }
        for result in self.evaluator.resolve(&registry) {
            self.decided.insert(result.signature_id);
            tracing::info!(
                target: "consensus",
                "EVENT:DECIDE step={} id={} accepted={} accept={} votes={}",
                self.step,
                result.signature_id,
                result.accepted,
                result.accept_count,
                result.vote_count
            );
            if result.accepted {
                report.accepted.push(result.signature_id);
            } else {
                report.rejected.push(result.signature_id);
            }
        }

        // Apply
        if !report.accepted.is_empty() {
            let records: BTreeMap<u64, &SignatureRecord> =
                shown.iter().flat_map(|batch| batch.iter()).map(|r| (r.id, r)).collect();

            for id in &report.accepted {
                let Some(record) = records.get(id) else {
                    continue;
                };
                for agent in &self.agents {
                    let mut participant = agent.write().await;
                    let agent_id = participant.agent_id();
                    match panic::catch_unwind(AssertUnwindSafe(|| participant.on_consensus_accept(record))) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            error!("❌ {} failed to apply signature {}: {}", agent_id, id, e);
                            report.update_failures += 1;
                        }
                        Err(_) => {
                            error!("💥 {} panicked applying signature {}", agent_id, id);
                            report.update_failures += 1;
                        }
                    }
                }
            }
        }

        Ok(self.finish(report, started))
    }

    async fn validate_sequential(&self, shown: &[Arc<Vec<SignatureRecord>>]) -> Vec<Ballot> {
        let mut ballots = Vec::with_capacity(shown.len());
        for (agent, records) in self.agents.iter().zip(shown) {
            let participant = agent.read().await;
            ballots.push(Ballot::cast(&**participant, records));
        }
        ballots
    }

    async fn validate_parallel(&self, shown: &[Arc<Vec<SignatureRecord>>]) -> Result<Vec<Ballot>> {
        let mut tasks = JoinSet::new();
        for (idx, (agent, records)) in self.agents.iter().zip(shown).enumerate() {
            if records.is_empty() {
                continue;
            }
            let permit = Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|e| SentinelError::Other(format!("validation pool closed: {}", e)))?;
            let agent = Arc::clone(agent);
            let records = Arc::clone(records);

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let participant = agent.blocking_read();
                (idx, Ballot::cast(&**participant, &records))
            });
        }

        let mut collected: Vec<Option<Ballot>> = (0..shown.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, ballot)) => collected[idx] = Some(ballot),
                Err(e) => warn!("💥 Validation worker died: {}", e),
            }
        }

        let mut ballots = Vec::with_capacity(shown.len());
        for (idx, ballot) in collected.into_iter().enumerate() {
            match ballot {
                Some(ballot) => ballots.push(ballot),
                None => {
                    // Skipped (nothing to validate) or the worker died
                    let agent_id = self.agents[idx].read().await.agent_id();
                    ballots.push(Ballot::fail_safe(agent_id, &shown[idx]));
                }
            }
        }
        Ok(ballots)
    }

    fn finish_aborted(&self, mut report: StepReport, phase: Phase, started: Instant) -> StepReport {
        report.outcome = StepOutcome::Aborted { phase };
        self.finish(report, started)
    }

    fn finish(&self, mut report: StepReport, started: Instant) -> StepReport {
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.sink.emit(&report);
        report
    }
}
