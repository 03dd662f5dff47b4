use tally_store::StoreError;

/// Errors from the idempotency gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The key is held by a record for a different request.
    #[error("key-reuse violation: idempotency key {key:?} was used for a different request")]
    KeyReuse { key: String },

    #[error("idempotency key must not be blank")]
    BlankKey,

    /// `complete` found no live record for the key.
    #[error("no live idempotency record for key {0:?}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type GateResult<T> = Result<T, GateError>;
