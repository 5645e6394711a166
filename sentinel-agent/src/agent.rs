use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use sentinel_common::{
    utils::time::current_time_millis, AgentId, Participant, Result, SignatureDraft, SignatureRecord, ValidationVote,
};

use crate::{
    blacklist::Blacklist,
    model::{AnomalyModel, LabeledExample},
    traffic::TrafficSource,
};

/// Metadata key recording how many rows the detecting batch had.
pub const BATCH_ROWS_KEY: &str = "batch_rows";

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Own anomaly score a batch must exceed before a signature is proposed.
    pub detection_threshold: f64,
    /// Minimum similarity for an accept vote.
    pub validation_threshold: f64,
    pub blacklist_ttl: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { detection_threshold: 3.0, validation_threshold: 0.8, blacklist_ttl: None }
    }
}

pub struct Agent {
    id: AgentId,
    config: AgentConfig,
    model: Box<dyn AnomalyModel>,
    traffic: Box<dyn TrafficSource>,
    blacklist: Blacklist,
    applied: HashSet<u64>,
    last_seen_ledger_id: u64,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("blacklist", &self.blacklist.len())
            .field("applied", &self.applied.len())
            .field("last_seen_ledger_id", &self.last_seen_ledger_id)
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(
        id: AgentId,
        config: AgentConfig,
        model: Box<dyn AnomalyModel>,
        traffic: Box<dyn TrafficSource>,
    ) -> Self {
        let blacklist = Blacklist::new(config.blacklist_ttl);
        Self { id, config, model, traffic, blacklist, applied: HashSet::new(), last_seen_ledger_id: 0 }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn model(&self) -> &dyn AnomalyModel {
        self.model.as_ref()
    }

    /// Number of accepted records this agent has learned from.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    fn similarity_of(&self, record: &SignatureRecord) -> f64 {
        if !record.has_usable_features() || record.feature_vector.len() != self.model.dimensions() {
            debug!("🧪 {} cannot score signature {}: unusable feature vector", self.id, record.id);
            return 0.0;
        }

        if let Some(ip) = record.source_ips().into_iter().find(|ip| self.blacklist.contains(ip)) {
            debug!("🧪 {} already blacklisted {} (signature {})", self.id, ip, record.id);
            return 1.0;
        }

        self.model.similarity(&record.feature_vector).unwrap_or(0.0)
    }
}

impl Participant for Agent {
    fn agent_id(&self) -> AgentId {
        self.id
    }

    fn propose(&mut self) -> Option<SignatureDraft> {
        let purged = self.blacklist.purge_expired(current_time_millis());
        if purged > 0 {
            debug!("🧹 {} expired {} blacklist entries", self.id, purged);
        }

        let batch = self.traffic.next_batch();
        if batch.is_empty() {
            return None;
        }

        let detection = self.model.detect(&batch);
        if !detection.is_anomaly || detection.score <= self.config.detection_threshold {
            debug!("🔍 {} quiet batch (score {:.3})", self.id, detection.score);
            return None;
        }

        info!(
            "🚨 {} detected anomaly: score {:.3}, sources {:?}",
            self.id, detection.score, detection.sources
        );

        let draft = SignatureDraft::new(self.id, detection.feature_vector, detection.score)
            .with_source_ips(detection.sources)
            .with_metadata(BATCH_ROWS_KEY, json!(batch.len()));
        Some(draft)
    }

    fn validate(&self, record: &SignatureRecord) -> Result<ValidationVote> {
        let similarity = self.similarity_of(record);
        let vote = if similarity >= self.config.validation_threshold {
            ValidationVote::accept(self.id, record.id, similarity)
        } else {
            ValidationVote::reject(self.id, record.id, similarity)
        };
        Ok(vote)
    }

    fn on_consensus_accept(&mut self, record: &SignatureRecord) -> Result<()> {
        if self.applied.contains(&record.id) {
            debug!("↩️ {} already applied signature {}", self.id, record.id);
            return Ok(());
        }

        let now = current_time_millis();
        let added = record
            .source_ips()
            .into_iter()
            .filter(|ip| self.blacklist.insert(ip, record.id, now))
            .count();

        let example = LabeledExample { signature_id: record.id, features: record.feature_vector.clone() };
        match self.model.retrain(&example) {
            Ok(next) => self.model = next,
            Err(e) => {
                warn!("⚠️ {} could not retrain on signature {}: {}", self.id, record.id, e);
                return Err(e);
            }
        }

        self.applied.insert(record.id);
        info!("🛡️ {} applied signature {} (+{} blacklist entries)", self.id, record.id, added);
        Ok(())
    }

    fn last_seen_ledger_id(&self) -> u64 {
        self.last_seen_ledger_id
    }

    fn advance_seen(&mut self, ledger_id: u64) {
        self.last_seen_ledger_id = self.last_seen_ledger_id.max(ledger_id);
    }
}
