/// Errors raised by audit sinks.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink {sink} failed: {reason}")]
    Sink { sink: String, reason: String },

    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
