use thiserror::Error;

/// Errors produced by type parsing and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown entry type: {0}")]
    UnknownEntryType(String),

    #[error("invalid currency code: {0:?} (expected three ASCII letters)")]
    InvalidCurrency(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid drawer id: must be non-empty")]
    EmptyDrawerId,
}
