use tally_types::VenueId;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The venue tail changed between read and commit.
    #[error("chain tail for {venue} moved: expected #{expected}, found #{actual}")]
    TailMoved {
        venue: VenueId,
        /// Entry number of the tail the writer read (0 for an empty chain).
        expected: u64,
        /// Entry number of the tail actually committed (0 for an empty chain).
        actual: u64,
    },

    /// Unique index violation on the idempotency key.
    #[error("duplicate idempotency key: {0}")]
    DuplicateKey(String),

    /// The requested record does not exist (or has expired).
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation does not apply to the record's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The journal contains a damaged record that is not a torn tail.
    #[error("corrupt journal record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend cannot serve requests (poisoned lock, closed file).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// `true` for failures of the backing store itself rather than of the
    /// request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Unavailable(_) | Self::Corrupt { .. })
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Unavailable(format!("{what} lock poisoned"))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
