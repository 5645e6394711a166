//! Step scheduling and majority consensus over the shared signature ledger.

pub mod consensus;
pub mod scheduler;
pub mod sink;

pub use consensus::{ConsensusEvaluator, QuorumPolicy, VoteOutcome, VoteRegistry};
pub use scheduler::{Phase, Scheduler, SchedulerConfig, SharedParticipant, StepOutcome, StepReport};
pub use sink::{FanoutSink, MemorySink, ObservabilitySink, TracingSink};
