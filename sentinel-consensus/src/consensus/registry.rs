use std::collections::BTreeMap;

use sentinel_common::{AgentId, ValidationVote, Vote};

/// What happened to a vote handed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded,
    /// Same agent, same record, same verdict. Ignored.
    Duplicate,
    /// Same agent, same record, different verdict. The first vote stands.
    Conflict { kept: Vote },
}

/// Votes of one step, one per (record, agent).
#[derive(Debug, Default, Clone)]
pub struct VoteRegistry {
    // SignatureId -> AgentId -> Vote
    votes: BTreeMap<u64, BTreeMap<AgentId, ValidationVote>>,
}

impl VoteRegistry {
    pub fn new() -> Self {
        Self { votes: BTreeMap::new() }
    }

    pub fn register_vote(&mut self, vote: ValidationVote) -> VoteOutcome {
        let per_agent = self.votes.entry(vote.signature_id).or_default();

        if let Some(existing) = per_agent.get(&vote.agent_id) {
            if existing.vote == vote.vote {
                return VoteOutcome::Duplicate;
            }
            return VoteOutcome::Conflict { kept: existing.vote };
        }

        per_agent.insert(vote.agent_id, vote);
        VoteOutcome::Recorded
    }

    pub fn count_accept(&self, signature_id: u64) -> usize {
        self.votes
            .get(&signature_id)
            .map(|m| m.values().filter(|v| v.vote.is_accept()).count())
            .unwrap_or(0)
    }

    pub fn count(&self, signature_id: u64) -> usize {
        self.votes.get(&signature_id).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn get_votes(&self, signature_id: u64) -> Option<&BTreeMap<AgentId, ValidationVote>> {
        self.votes.get(&signature_id)
    }

    /// Record ids that received at least one vote, ascending.
    pub fn signature_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.votes.keys().copied()
    }

    pub fn total_votes(&self) -> usize {
        self.votes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_votes() {
        let mut registry = VoteRegistry::new();

        let res = registry.register_vote(ValidationVote::accept(AgentId(1), 7, 0.9));
        assert_eq!(res, VoteOutcome::Recorded);

        // Idempotent (same vote)
        let res = registry.register_vote(ValidationVote::accept(AgentId(1), 7, 0.95));
        assert_eq!(res, VoteOutcome::Duplicate);
        assert_eq!(registry.count(7), 1);
    }

    #[test]
    fn test_conflicting_vote_keeps_first() {
        let mut registry = VoteRegistry::new();
        registry.register_vote(ValidationVote::accept(AgentId(1), 7, 0.9));

        let res = registry.register_vote(ValidationVote::reject(AgentId(1), 7, 0.1));
        assert_eq!(res, VoteOutcome::Conflict { kept: Vote::Accept });
        assert_eq!(registry.count_accept(7), 1);
    }

    #[test]
    fn test_counts_per_signature() {
        let mut registry = VoteRegistry::new();
        registry.register_vote(ValidationVote::accept(AgentId(1), 2, 0.9));
        registry.register_vote(ValidationVote::reject(AgentId(2), 2, 0.2));
        registry.register_vote(ValidationVote::accept(AgentId(1), 1, 0.9));

        assert_eq!(registry.count(2), 2);
        assert_eq!(registry.count_accept(2), 1);
        assert_eq!(registry.count(3), 0);
        assert_eq!(registry.total_votes(), 3);
        assert_eq!(registry.signature_ids().collect::<Vec<_>>(), vec![1, 2]);
    }
}
