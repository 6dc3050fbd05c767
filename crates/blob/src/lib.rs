pub mod error;
pub mod state_store;
pub mod store;
pub mod types;

pub use error::BlobError;
pub use state_store::StateBlobStore;
pub use store::BlobStore;
pub use types::{BlobMetadata, ResolvedBlob, sha256_hex};
