//! Vote bookkeeping and quorum evaluation.
//!
//! The registry collects one vote per (record, agent) for a step; the
//! evaluator turns those votes into accept/reject decisions under a
//! [`QuorumPolicy`](evaluator::QuorumPolicy).

pub mod evaluator;
pub mod registry;

pub use evaluator::{ConsensusEvaluator, QuorumPolicy};
pub use registry::{VoteOutcome, VoteRegistry};
