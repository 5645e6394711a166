use serde::{Deserialize, Serialize};
use tracing::info;

use sentinel_common::{ConsensusResult, Result, SentinelError};

use super::registry::VoteRegistry;

/// Acceptance rule for a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumPolicy {
    /// Fraction of accept votes a record must exceed.
    pub threshold: f64,
    /// Accept at exactly `threshold` as well.
    #[serde(default)]
    pub inclusive: bool,
    /// Fewer votes than this always rejects.
    #[serde(default = "default_min_voters")]
    pub min_voters: usize,
}

fn default_min_voters() -> usize {
    1
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self { threshold: 0.5, inclusive: false, min_voters: default_min_voters() }
    }
}

impl QuorumPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.threshold.is_nan() || self.threshold <= 0.0 || self.threshold > 1.0 {
            return Err(SentinelError::Config(format!(
                "quorum threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// True when `accept_count` out of `vote_count` clears the quorum.
    pub fn is_met(&self, accept_count: usize, vote_count: usize) -> bool {
        if vote_count == 0 || vote_count < self.min_voters {
            return false;
        }
        let ratio = accept_count as f64 / vote_count as f64;
        if self.inclusive {
            ratio >= self.threshold
        } else {
            ratio > self.threshold
        }
    }
}

/// Turns a step's votes into consensus results.
#[derive(Debug, Clone)]
pub struct ConsensusEvaluator {
    policy: QuorumPolicy,
}

impl ConsensusEvaluator {
    pub fn new(policy: QuorumPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &QuorumPolicy {
        &self.policy
    }

    /// One result per voted record, ascending by id. Depends on nothing but
    /// the registry contents and the policy.
    pub fn resolve(&self, registry: &VoteRegistry) -> Vec<ConsensusResult> {
        registry
            .signature_ids()
            .map(|signature_id| {
                let vote_count = registry.count(signature_id);
                let accept_count = registry.count_accept(signature_id);
                let accepted = self.policy.is_met(accept_count, vote_count);

                info!(
                    "🗳️ Signature [{}]: {}/{} accept votes (threshold {}) — {}",
                    signature_id,
                    accept_count,
                    vote_count,
                    self.policy.threshold,
                    if accepted { "✅ ACCEPTED" } else { "❌ REJECTED" }
                );

                ConsensusResult { signature_id, accepted, vote_count, accept_count }
            })
            .collect()
    }
}
