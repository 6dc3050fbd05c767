use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use permittree_state::{KeyKind, StateKey, StateStore};

use crate::error::BlobError;
use crate::store::BlobStore;
use crate::types::{BlobMetadata, ResolvedBlob, sha256_hex};

/// The JSON document a blob is persisted as.
#[derive(Serialize, Deserialize)]
struct BlobDocument {
    metadata: BlobMetadata,
    /// Base64 (standard alphabet) encoded content.
    data: String,
}

/// [`BlobStore`] that keeps files as base64 documents in a [`StateStore`].
///
/// Blobs live under the store's own office namespace so they can be
/// fetched by id alone; the uploading office is recorded in the metadata.
pub struct StateBlobStore {
    state: Arc<dyn StateStore>,
    office: String,
}

impl StateBlobStore {
    pub fn new(state: Arc<dyn StateStore>, office: impl Into<String>) -> Self {
        Self {
            state,
            office: office.into(),
        }
    }

    fn key(&self, id: &str) -> StateKey {
        StateKey::new(&self.office, KeyKind::Blob, id)
    }

    async fn load(&self, id: &str) -> Result<Option<BlobDocument>, BlobError> {
        let Some(raw) = self.state.get(&self.key(id)).await? else {
            return Ok(None);
        };
        let doc = serde_json::from_str(&raw).map_err(|e| BlobError::Corrupt {
            id: id.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Some(doc))
    }
}

#[async_trait]
impl BlobStore for StateBlobStore {
    async fn put(
        &self,
        office: &str,
        owner: &str,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobMetadata, BlobError> {
        let metadata = BlobMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.to_owned(),
            content_type: content_type.to_owned(),
            size_bytes: data.len() as u64,
            checksum_sha256: sha256_hex(&data),
            office: office.to_owned(),
            owner: owner.to_owned(),
            created_at: chrono::Utc::now(),
        };
        let doc = BlobDocument {
            metadata: metadata.clone(),
            data: STANDARD.encode(&data),
        };
        let raw = serde_json::to_string(&doc).map_err(|e| BlobError::Storage(e.to_string()))?;

        if !self.state.check_and_set(&self.key(&metadata.id), &raw, None).await? {
            return Err(BlobError::Storage(format!(
                "blob id collision: {}",
                metadata.id
            )));
        }
        debug!(blob = %metadata.id, size = metadata.size_bytes, "blob stored");
        Ok(metadata)
    }

    async fn get(&self, id: &str) -> Result<Option<ResolvedBlob>, BlobError> {
        let Some(doc) = self.load(id).await? else {
            return Ok(None);
        };
        let data = STANDARD
            .decode(doc.data.as_bytes())
            .map_err(|e| BlobError::Corrupt {
                id: id.to_owned(),
                reason: e.to_string(),
            })?;
        if sha256_hex(&data) != doc.metadata.checksum_sha256 {
            return Err(BlobError::Corrupt {
                id: id.to_owned(),
                reason: "checksum mismatch".to_owned(),
            });
        }
        Ok(Some(ResolvedBlob {
            metadata: doc.metadata,
            data: Bytes::from(data),
        }))
    }

    async fn get_metadata(&self, id: &str) -> Result<Option<BlobMetadata>, BlobError> {
        Ok(self.load(id).await?.map(|doc| doc.metadata))
    }

    async fn delete(&self, id: &str) -> Result<bool, BlobError> {
        Ok(self.state.delete(&self.key(id)).await?)
    }

    async fn list(&self, office: &str, owner: &str) -> Result<Vec<BlobMetadata>, BlobError> {
        let entries = self.state.scan_keys(&self.office, KeyKind::Blob).await?;
        let mut blobs: Vec<BlobMetadata> = entries
            .into_iter()
            .filter_map(|(_, raw)| serde_json::from_str::<BlobDocument>(&raw).ok())
            .map(|doc| doc.metadata)
            .filter(|m| m.office == office && m.owner == owner)
            .collect();
        blobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(blobs)
    }
}
