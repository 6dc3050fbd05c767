/// Errors raised by the transition trail.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The backend failed to read or write records.
    #[error("audit storage error: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error("audit serialization error: {0}")]
    Serialization(String),

    /// The query's filters contradict each other.
    #[error("invalid audit query: {0}")]
    InvalidQuery(String),
}
