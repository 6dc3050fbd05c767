use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::{AuditPage, AuditQuery, TransitionRecord};

/// Trait for transition trail storage backends.
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a transition record.
    async fn record(&self, entry: TransitionRecord) -> Result<(), AuditError>;

    /// Retrieve a record by its unique ID.
    async fn get_by_id(&self, id: &str) -> Result<Option<TransitionRecord>, AuditError>;

    /// Every record touching an application (including its order of
    /// payment and certificate), oldest first.
    async fn history(&self, application_id: &str) -> Result<Vec<TransitionRecord>, AuditError>;

    /// Query records with filters and pagination, newest first.
    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError>;
}
