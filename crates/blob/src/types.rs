use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata for an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,
    pub size_bytes: u64,
    /// `SHA-256` hex digest of the blob content.
    pub checksum_sha256: String,
    pub office: String,
    /// Username of the account that uploaded the file.
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata plus the binary content.
#[derive(Debug, Clone)]
pub struct ResolvedBlob {
    pub metadata: BlobMetadata,
    pub data: bytes::Bytes,
}

/// Lowercase hex `SHA-256` digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
