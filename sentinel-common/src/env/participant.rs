use crate::{
    env::{
        signature::{SignatureDraft, SignatureRecord},
        vote_data::ValidationVote,
    },
    error::Result,
    utils::AgentId,
};

/// What the scheduler needs from an agent.
///
/// Agents never write to the ledger themselves: proposals are returned to the
/// scheduler and new records are handed to them for validation.
pub trait Participant: Send + Sync {
    fn agent_id(&self) -> AgentId;

    /// Runs local detection and returns a candidate when the agent's own
    /// anomaly score clears its detection threshold.
    fn propose(&mut self) -> Option<SignatureDraft>;

    /// Scores a ledger record against the agent's known anomalous patterns.
    fn validate(&self, record: &SignatureRecord) -> Result<ValidationVote>;

    /// Applies a record the population accepted. Must be idempotent.
    fn on_consensus_accept(&mut self, record: &SignatureRecord) -> Result<()>;

    fn last_seen_ledger_id(&self) -> u64;

    /// Moves the validation watermark forward. Never moves it backwards.
    fn advance_seen(&mut self, ledger_id: u64);
}
