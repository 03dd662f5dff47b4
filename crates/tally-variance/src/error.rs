use tally_ledger::LedgerError;
use tally_store::StoreError;
use tally_types::AlertId;

/// Errors from variance detection and alert handling.
#[derive(Debug, thiserror::Error)]
pub enum VarianceError {
    #[error("invalid drawer count: {0}")]
    Validation(String),

    /// Only managers may resolve alerts.
    #[error("{0} may not resolve variance alerts")]
    NotAuthorized(String),

    #[error("alert {0} not found")]
    AlertNotFound(AlertId),

    #[error("alert {0} is already resolved")]
    AlreadyResolved(AlertId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type VarianceResult<T> = Result<T, VarianceError>;
