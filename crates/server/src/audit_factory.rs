use std::sync::Arc;

use permittree_audit::AuditStore;
use permittree_audit_memory::MemoryAuditStore;
#[cfg(feature = "postgres")]
use permittree_audit_postgres::{PostgresAuditConfig, PostgresAuditStore};

use crate::config::AuditConfig;
use crate::error::ServerError;

/// Create an audit store from the given configuration.
#[allow(clippy::unused_async)]
pub async fn create_audit_store(config: &AuditConfig) -> Result<Arc<dyn AuditStore>, ServerError> {
    let store: Arc<dyn AuditStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryAuditStore::new()),
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("audit postgres backend requires [audit] url".into())
            })?;

            let pg_config = PostgresAuditConfig::new(url).with_prefix(&config.prefix);

            let store = PostgresAuditStore::new(&pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("audit postgres: {e}")))?;

            Arc::new(store)
        }
        other => {
            return Err(ServerError::Config(format!(
                "unknown audit backend: {other} (is the feature enabled?)"
            )));
        }
    };
    Ok(store)
}
