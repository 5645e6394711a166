use serde::{Deserialize, Serialize};

use crate::{env::consensus::types::Vote, utils::AgentId};

/// One agent's vote on one ledger record. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVote {
    pub agent_id: AgentId,
    pub signature_id: u64,
    pub vote: Vote,
    pub similarity: f64,
}

impl ValidationVote {
    pub fn accept(agent_id: AgentId, signature_id: u64, similarity: f64) -> Self {
        Self { agent_id, signature_id, vote: Vote::Accept, similarity }
    }

    pub fn reject(agent_id: AgentId, signature_id: u64, similarity: f64) -> Self {
        Self { agent_id, signature_id, vote: Vote::Reject, similarity }
    }

    /// Reject cast on an agent's behalf when its validation failed.
    pub fn fail_safe(agent_id: AgentId, signature_id: u64) -> Self {
        Self::reject(agent_id, signature_id, 0.0)
    }
}
