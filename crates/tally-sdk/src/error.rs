use tally_gate::GateError;
use tally_ledger::LedgerError;
use tally_store::StoreError;
use tally_variance::VarianceError;

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The same request is still running elsewhere and did not finish in time.
    #[error("request {key:?} is still in flight")]
    InFlight { key: String },

    #[error("{0} may not perform this operation")]
    NotAuthorized(String),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("variance error: {0}")]
    Variance(#[from] VarianceError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
