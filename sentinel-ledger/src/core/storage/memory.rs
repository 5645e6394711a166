use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use uuid::Uuid;

use sentinel_common::{Result, SentinelError, SignatureDraft, SignatureRecord, LEDGER_ORIGIN_ID};

use super::LedgerBackend;

/// In-memory ledger storage (tests, throwaway runs).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<u64, SignatureRecord>,
    keys: HashMap<Uuid, u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> SentinelError {
    SentinelError::Storage("memory ledger lock poisoned".to_string())
}

impl LedgerBackend for MemoryBackend {
    fn insert(&self, draft: &SignatureDraft) -> Result<u64> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        if let Some(id) = state.keys.get(&draft.proposal_key) {
            return Ok(*id);
        }

        let id = state
            .records
            .keys()
            .next_back()
            .map(|last| last + 1)
            .unwrap_or(LEDGER_ORIGIN_ID);

        state.records.insert(id, draft.clone().into_record(id));
        state.keys.insert(draft.proposal_key, id);
        Ok(id)
    }

    fn range_from(&self, first_id: u64) -> Result<Vec<SignatureRecord>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.records.range(first_id..).map(|(_, r)| r.clone()).collect())
    }

    fn get(&self, id: u64) -> Result<Option<SignatureRecord>> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.records.get(&id).cloned())
    }

    fn last_id(&self) -> Result<u64> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.records.keys().next_back().copied().unwrap_or(0))
    }
}
