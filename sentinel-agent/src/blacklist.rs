use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// Ledger id of the first accepted signature that flagged the entity.
    pub signature_id: u64,
    pub added_at: i64,
}

/// Agent-local set of flagged entities.
///
/// Insert-only; entries disappear solely through `purge_expired` when a TTL
/// is configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blacklist {
    entries: BTreeMap<String, BlacklistEntry>,
    ttl: Option<Duration>,
}

impl Blacklist {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self { entries: BTreeMap::new(), ttl }
    }

    /// Returns `true` only when the entity was not listed yet.
    pub fn insert(&mut self, entity: &str, signature_id: u64, now: i64) -> bool {
        if self.entries.contains_key(entity) {
            return false;
        }
        self.entries.insert(entity.to_string(), BlacklistEntry { signature_id, added_at: now });
        true
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entries.contains_key(entity)
    }

    pub fn get(&self, entity: &str) -> Option<&BlacklistEntry> {
        self.entries.get(entity)
    }

    /// Drops entries older than the TTL. Returns how many were removed.
    pub fn purge_expired(&mut self, now: i64) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let before = self.entries.len();
        self.entries.retain(|_, entry| now.saturating_sub(entry.added_at) < ttl_ms);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
