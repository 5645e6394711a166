pub mod core;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use sentinel_common::{Result, SentinelError, SignatureDraft, SignatureRecord, LEDGER_ORIGIN_ID};

use crate::core::integrity::verify_sequence;
pub use crate::core::retry::RetryPolicy;
pub use crate::core::storage::{LedgerBackend, MemoryBackend, RedbBackend};

/// Read-through cache of the full ledger.
///
/// `generation` is bumped by every successful append so a fill computed
/// before the append is never stored after it.
#[derive(Debug, Default)]
struct ReadCache {
    generation: u64,
    records: Option<Arc<Vec<SignatureRecord>>>,
}

/// Append-only, shared signature ledger.
///
/// All appends go through one async mutex; reads never take it.
#[derive(Debug)]
pub struct Ledger {
    backend: Arc<dyn LedgerBackend>,
    write_lock: Mutex<()>,
    cache: RwLock<ReadCache>,
    retry: RetryPolicy,
}

impl Ledger {
    pub fn with_backend(backend: Arc<dyn LedgerBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
            cache: RwLock::new(ReadCache::default()),
            retry,
        }
    }

    /// Opens (or creates) the file-backed ledger under `data_dir` and checks
    /// the stored id sequence before handing it out.
    pub async fn open<P: AsRef<Path>>(data_dir: P, retry: RetryPolicy) -> Result<Self> {
        let backend = RedbBackend::open(data_dir)?;
        let ledger = Self::with_backend(Arc::new(backend), retry);

        let existing = ledger.read_all().await?;
        if !existing.is_empty() {
            info!("📚 Ledger reopened with {} signatures (last id {})", existing.len(), ledger.last_id()?);
        }
        Ok(ledger)
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), RetryPolicy::default())
    }

    /// Appends a draft and returns the id it was assigned.
    ///
    /// Transient backend errors are retried with the same proposal key, so a
    /// retry can never produce a second copy of the record.
    pub async fn append(&self, draft: SignatureDraft) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            match self.backend.insert(&draft) {
                Ok(id) => {
                    self.invalidate_cache().await;
                    tracing::info!(target: "consensus", "EVENT:APPEND id={} origin={} key={}", id, draft.origin, draft.proposal_key);
                    return Ok(id);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!("⚠️ Append from {} failed (attempt {}/{}): {}. Retrying...", draft.origin, attempt, attempts, e);
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("❌ Append from {} failed after {} attempt(s): {}", draft.origin, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    /// Every record in id order.
    pub async fn read_all(&self) -> Result<Arc<Vec<SignatureRecord>>> {
        let generation = {
            let cache = self.cache.read().await;
            if let Some(records) = &cache.records {
                return Ok(Arc::clone(records));
            }
            cache.generation
        };

        let records = self.backend.range_from(LEDGER_ORIGIN_ID)?;
        verify_sequence(&records, LEDGER_ORIGIN_ID)?;
        let records = Arc::new(records);

        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.records = Some(Arc::clone(&records));
        }
        Ok(records)
    }

    /// Records with `id > last_seen_id`, in id order.
    pub async fn read_since(&self, last_seen_id: u64) -> Result<Vec<SignatureRecord>> {
        {
            let cache = self.cache.read().await;
            if let Some(records) = &cache.records {
                // Ids are gap-free from the origin, so the position is the id offset
                let skip = last_seen_id.saturating_sub(LEDGER_ORIGIN_ID - 1) as usize;
                return Ok(records.iter().skip(skip).cloned().collect());
            }
        }

        let first = last_seen_id.saturating_add(1).max(LEDGER_ORIGIN_ID);
        let records = self.backend.range_from(first)?;
        verify_sequence(&records, first)?;
        Ok(records)
    }

    pub async fn get_by_id(&self, id: u64) -> Result<SignatureRecord> {
        {
            let cache = self.cache.read().await;
            if let Some(records) = &cache.records {
                let hit = id
                    .checked_sub(LEDGER_ORIGIN_ID)
                    .and_then(|offset| records.get(offset as usize))
                    .filter(|record| record.id == id);
                return hit.cloned().ok_or(SentinelError::NotFound(id));
            }
        }

        self.backend.get(id)?.ok_or(SentinelError::NotFound(id))
    }

    pub fn last_id(&self) -> Result<u64> {
        self.backend.last_id()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.backend.last_id()?.saturating_sub(LEDGER_ORIGIN_ID - 1) as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    async fn invalidate_cache(&self) {
        let mut cache = self.cache.write().await;
        cache.generation += 1;
        cache.records = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::AgentId;

    fn draft(origin: u32, features: Vec<f64>) -> SignatureDraft {
        SignatureDraft::new(AgentId(origin), features, 0.9)
    }

    #[tokio::test]
    async fn test_append_assigns_sequential_ids() {
        let ledger = Ledger::in_memory();
        assert_eq!(ledger.append(draft(1, vec![1.0])).await.unwrap(), 1);
        assert_eq!(ledger.append(draft(2, vec![2.0])).await.unwrap(), 2);
        assert_eq!(ledger.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cache_is_invalidated_by_append() {
        let ledger = Ledger::in_memory();
        ledger.append(draft(1, vec![1.0])).await.unwrap();

        let before = ledger.read_all().await.unwrap();
        assert_eq!(before.len(), 1);

        ledger.append(draft(2, vec![2.0])).await.unwrap();
        let after = ledger.read_all().await.unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[1].origin, AgentId(2));
    }

    #[tokio::test]
    async fn test_read_since_excludes_seen_ids() {
        let ledger = Ledger::in_memory();
        for i in 0..5 {
            ledger.append(draft(i, vec![i as f64])).await.unwrap();
        }

        // Cold path (backend range read)
        let cold: Vec<u64> = ledger.read_since(3).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(cold, vec![4, 5]);

        // Warm path (cache)
        ledger.read_all().await.unwrap();
        let warm: Vec<u64> = ledger.read_since(3).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(warm, vec![4, 5]);

        assert!(ledger.read_since(5).await.unwrap().is_empty());
        assert!(ledger.read_since(50).await.unwrap().is_empty());
        assert_eq!(ledger.read_since(0).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_get_by_id_cold_and_warm() {
        let ledger = Ledger::in_memory();
        ledger.append(draft(7, vec![5.0, 5.0])).await.unwrap();

        assert_eq!(ledger.get_by_id(1).await.unwrap().origin, AgentId(7));
        assert!(matches!(ledger.get_by_id(2).await, Err(SentinelError::NotFound(2))));

        ledger.read_all().await.unwrap();
        assert_eq!(ledger.get_by_id(1).await.unwrap().feature_vector, vec![5.0, 5.0]);
        assert!(matches!(ledger.get_by_id(0).await, Err(SentinelError::NotFound(0))));
        assert!(matches!(ledger.get_by_id(9).await, Err(SentinelError::NotFound(9))));
    }
}
