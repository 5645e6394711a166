//! Persistence backends for the signature ledger.
//!
//! Any store that can insert a record and hand back a fresh sequential id in
//! one atomic step, and read records back in id order, can sit behind the
//! [`LedgerBackend`] trait.

pub mod memory;
pub mod redb_backend;

use std::fmt;

use sentinel_common::{Result, SignatureDraft, SignatureRecord};

pub use memory::MemoryBackend;
pub use redb_backend::RedbBackend;

pub trait LedgerBackend: Send + Sync + fmt::Debug {
    /// Inserts the draft under `last_id() + 1` and returns that id.
    ///
    /// Must be a single atomic transaction: on error nothing is persisted.
    /// A draft whose `proposal_key` is already stored returns the stored id.
    fn insert(&self, draft: &SignatureDraft) -> Result<u64>;

    /// All records with `id >= first_id`, in id order.
    fn range_from(&self, first_id: u64) -> Result<Vec<SignatureRecord>>;

    fn get(&self, id: u64) -> Result<Option<SignatureRecord>>;

    /// Highest id stored, `0` when empty.
    fn last_id(&self) -> Result<u64>;
}
