use std::fmt;

use serde::{Deserialize, Serialize};

/// An agent's verdict on a proposed signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    Accept,
    Reject,
}

impl Vote {
    pub fn is_accept(self) -> bool {
        matches!(self, Vote::Accept)
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vote::Accept => "Accept",
            Vote::Reject => "Reject",
        };
        write!(f, "{}", s)
    }
}

/// The result of consensus evaluation for a single signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// The ledger id this result corresponds to.
    pub signature_id: u64,

    /// Whether the accept ratio cleared the quorum threshold.
    pub accepted: bool,

    /// Total votes tallied for the signature in this step.
    pub vote_count: usize,

    /// The number of `Accept` votes among them.
    pub accept_count: usize,
}

impl ConsensusResult {
    pub fn accept_ratio(&self) -> f64 {
        if self.vote_count == 0 {
            return 0.0;
        }
        self.accept_count as f64 / self.vote_count as f64
    }
}
