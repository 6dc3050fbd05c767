use thiserror::Error;

use permittree_core::TransitionError;

/// Errors returned by workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The document does not exist (or is not visible to the caller).
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's role or ownership does not permit the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The state machine has no such move from the document's current status.
    #[error("invalid transition: cannot {event} from {from}")]
    InvalidTransition { from: String, event: String },

    /// Missing fields, documents, remarks or other bad input.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The document kept changing underneath us.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("state error: {0}")]
    State(#[from] permittree_state::StateError),

    #[error("blob error: {0}")]
    Blob(#[from] permittree_blob::BlobError),

    #[error("audit error: {0}")]
    Audit(#[from] permittree_audit::AuditError),

    #[error("template error: {0}")]
    Template(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The workflow was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl WorkflowError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidTransition {
            from: e.from_status().to_owned(),
            event: e.event().to_owned(),
        }
    }
}

impl From<minijinja::Error> for WorkflowError {
    fn from(e: minijinja::Error) -> Self {
        Self::Template(e.to_string())
    }
}
