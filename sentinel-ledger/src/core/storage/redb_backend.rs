use std::fmt;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use sentinel_common::{Result, SentinelError, SignatureDraft, SignatureRecord, LEDGER_ORIGIN_ID};

use super::LedgerBackend;

const SIGNATURES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("signatures");
const PROPOSAL_KEYS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("proposal_keys");

pub const LEDGER_FILE: &str = "ledger.redb";

/// File-backed ledger storage on top of redb.
///
/// Every insert is one write transaction covering both the record and its
/// proposal key, so a failed commit leaves neither behind.
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbBackend")
            .field("db", &"Redb")
            .field("path", &self.path)
            .finish()
    }
}

/// Maps redb failures onto the ledger taxonomy.
fn storage_err<E: Into<redb::Error>>(e: E) -> SentinelError {
    match e.into() {
        redb::Error::Io(io) => match io.kind() {
            std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::TimedOut => SentinelError::TransientStorage(io.to_string()),
            _ => SentinelError::Io(io),
        },
        redb::Error::DatabaseAlreadyOpen => {
            SentinelError::Storage("ledger database is already open in another process or handle".to_string())
        }
        other => SentinelError::Storage(other.to_string()),
    }
}

impl RedbBackend {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LEDGER_FILE);

        let db = Database::create(&path).map_err(storage_err)?;

        // Initialize tables
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _signatures = write_txn.open_table(SIGNATURES_TABLE).map_err(storage_err)?;
            let _keys = write_txn.open_table(PROPOSAL_KEYS_TABLE).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        debug!("📂 Ledger database opened at {:?}", path);
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerBackend for RedbBackend {
    fn insert(&self, draft: &SignatureDraft) -> Result<u64> {
        let key = draft.proposal_key.to_string();
        let write_txn = self.db.begin_write().map_err(storage_err)?;

        // Idempotency: a retried append finds its own earlier commit
        let existing = {
            let keys = write_txn.open_table(PROPOSAL_KEYS_TABLE).map_err(storage_err)?;
            let found = keys.get(key.as_str()).map_err(storage_err)?.map(|guard| guard.value());
            found
        };
        if let Some(id) = existing {
            write_txn.abort().map_err(storage_err)?;
            return Ok(id);
        }

        let id = {
            let mut signatures = write_txn.open_table(SIGNATURES_TABLE).map_err(storage_err)?;
            let last = signatures
                .last()
                .map_err(storage_err)?
                .map(|(k, _)| k.value())
                .unwrap_or(LEDGER_ORIGIN_ID - 1);
            let id = last + 1;

            let bytes = serde_json::to_vec(&draft.clone().into_record(id))?;
            signatures.insert(id, bytes.as_slice()).map_err(storage_err)?;
            id
        };
        {
            let mut keys = write_txn.open_table(PROPOSAL_KEYS_TABLE).map_err(storage_err)?;
            keys.insert(key.as_str(), id).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        Ok(id)
    }

    fn range_from(&self, first_id: u64) -> Result<Vec<SignatureRecord>> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(SIGNATURES_TABLE).map_err(storage_err)?;

        let mut records = Vec::new();
        for entry in table.range(first_id..).map_err(storage_err)? {
            let (_, value) = entry.map_err(storage_err)?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    fn get(&self, id: u64) -> Result<Option<SignatureRecord>> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(SIGNATURES_TABLE).map_err(storage_err)?;

        if let Some(value) = table.get(id).map_err(storage_err)? {
            let record: SignatureRecord = serde_json::from_slice(value.value())?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn last_id(&self) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(SIGNATURES_TABLE).map_err(storage_err)?;
        let last = table.last().map_err(storage_err)?.map(|(k, _)| k.value());
        Ok(last.unwrap_or(0))
    }
}
