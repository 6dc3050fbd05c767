use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;
use crate::types::{BlobMetadata, ResolvedBlob};

/// Storage for uploaded permit documents and payment proofs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob and return its metadata.
    ///
    /// The store assigns a unique ID and computes a `SHA-256` checksum.
    async fn put(
        &self,
        office: &str,
        owner: &str,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobMetadata, BlobError>;

    /// Retrieve a blob by ID, returning both metadata and content.
    async fn get(&self, id: &str) -> Result<Option<ResolvedBlob>, BlobError>;

    /// Retrieve only the metadata for a blob.
    async fn get_metadata(&self, id: &str) -> Result<Option<BlobMetadata>, BlobError>;

    /// Delete a blob by ID. Returns `true` if the blob existed.
    async fn delete(&self, id: &str) -> Result<bool, BlobError>;

    /// List blobs uploaded by `owner` in `office`, oldest first.
    async fn list(&self, office: &str, owner: &str) -> Result<Vec<BlobMetadata>, BlobError>;
}
