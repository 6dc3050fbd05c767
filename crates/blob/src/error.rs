use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The blob exceeds the maximum allowed size.
    #[error("blob too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("blob storage error: {0}")]
    Storage(String),

    /// The stored document could not be decoded.
    #[error("corrupt blob {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("invalid content type: {0}")]
    InvalidContentType(String),
}

impl From<permittree_state::StateError> for BlobError {
    fn from(e: permittree_state::StateError) -> Self {
        Self::Storage(e.to_string())
    }
}
