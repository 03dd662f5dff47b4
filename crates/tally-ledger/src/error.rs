use tally_store::StoreError;
use tally_types::{EntryId, VenueId};

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The draft was rejected before touching the chain.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Concurrent writers kept moving the tail until retries ran out.
    #[error("chain conflict on {venue}: tail kept moving after {attempts} attempts")]
    ChainConflict { venue: VenueId, attempts: u32 },

    /// An entry already exists for the key with a different payload.
    #[error("idempotency key {key:?} already recorded entry {existing} with a different payload")]
    DuplicateKeyMismatch { key: String, existing: EntryId },

    /// The venue chain failed verification and appends are halted.
    #[error("integrity violation on {venue}: {reason}")]
    IntegrityViolation { venue: VenueId, reason: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        Self::StorageUnavailable(err)
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
