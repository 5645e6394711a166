use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    /// Lock contention, timeouts, interrupted IO. Safe to retry.
    #[error("Transient storage error: {0}")]
    TransientStorage(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// The ledger id sequence is broken (gap or duplicate).
    #[error("Ledger integrity violation: {0}")]
    Integrity(String),

    #[error("Signature {0} not found")]
    NotFound(u64),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Update failed: {0}")]
    Update(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other: {0}")]
    Other(String),
}

impl SentinelError {
    pub fn is_transient(&self) -> bool {
        match self {
            SentinelError::TransientStorage(_) => true,
            SentinelError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Errors the simulation must not paper over.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SentinelError::Integrity(_) | SentinelError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
