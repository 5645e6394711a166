use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::utils::{time::current_time_millis, AgentId};

/// First id handed out by an empty ledger.
pub const LEDGER_ORIGIN_ID: u64 = 1;

/// Metadata key carrying the offending source addresses of a signature.
pub const SOURCE_IPS_KEY: &str = "source_ips";

/// A threat signature proposed by an agent but not yet appended.
///
/// The ledger turns it into a [`SignatureRecord`] by assigning the next id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureDraft {
    pub origin: AgentId,
    pub feature_vector: Vec<f64>,
    pub confidence: f64,
    pub created_at: i64,

    /// Idempotency key of this logical proposal. Retried appends reuse it.
    pub proposal_key: Uuid,

    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl SignatureDraft {
    pub fn new(origin: AgentId, feature_vector: Vec<f64>, confidence: f64) -> Self {
        Self {
            origin,
            feature_vector,
            confidence,
            created_at: current_time_millis(),
            proposal_key: Uuid::new_v4(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_source_ips<I, S>(self, ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ips: Vec<Value> = ips.into_iter().map(|ip| Value::String(ip.into())).collect();
        self.with_metadata(SOURCE_IPS_KEY, Value::Array(ips))
    }

    pub fn into_record(self, id: u64) -> SignatureRecord {
        SignatureRecord {
            id,
            origin: self.origin,
            feature_vector: self.feature_vector,
            confidence: self.confidence,
            created_at: self.created_at,
            proposal_key: self.proposal_key,
            metadata: self.metadata,
        }
    }
}

/// A signature as stored in the ledger. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub id: u64,
    pub origin: AgentId,
    pub feature_vector: Vec<f64>,
    pub confidence: f64,
    pub created_at: i64,
    pub proposal_key: Uuid,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl SignatureRecord {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Source addresses listed in metadata.
    ///
    /// Missing keys, non-array values and non-string items are skipped.
    pub fn source_ips(&self) -> Vec<&str> {
        match self.metadata.get(SOURCE_IPS_KEY) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(single)) => vec![single.as_str()],
            _ => Vec::new(),
        }
    }

    /// True when the feature vector can be scored at all.
    pub fn has_usable_features(&self) -> bool {
        !self.feature_vector.is_empty() && self.feature_vector.iter().all(|v| v.is_finite())
    }
}
