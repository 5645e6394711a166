//! Types shared by every Sentinel crate: signature records, votes,
//! consensus results, the participant contract and the common error type.

pub mod env;
pub mod error;
pub mod utils;

pub use env::consensus::types::{ConsensusResult, Vote};
pub use env::participant::Participant;
pub use env::signature::{SignatureDraft, SignatureRecord, LEDGER_ORIGIN_ID};
pub use env::vote_data::ValidationVote;
pub use error::{Result, SentinelError};
pub use utils::AgentId;
