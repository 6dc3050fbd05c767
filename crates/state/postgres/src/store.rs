use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use permittree_state::error::StateError;
use permittree_state::key::{KeyKind, StateKey};
use permittree_state::store::{CasResult, StateStore, Versioned};

use crate::config::PostgresConfig;
use crate::migrations;

fn backend(e: sqlx::Error) -> StateError {
    StateError::Backend(e.to_string())
}

fn to_version(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StateError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StateError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StateError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

/// PostgreSQL-backed implementation of [`StateStore`].
///
/// All documents live in one table keyed by canonical key. TTL is handled via
/// an `expires_at TIMESTAMPTZ` column: reads filter out expired rows with
/// `WHERE (expires_at IS NULL OR expires_at > NOW())`.
pub struct PostgresStateStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresStateStore {
    /// Connect, create the pool, and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Connection`] if pool creation fails, or
    /// [`StateError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StateError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        Self::from_pool(pool, config).await
    }

    /// Wrap an existing pool (shared with the audit backend, for example).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StateError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(backend)?;
        debug!(table = %config.documents_table(), "postgres document store ready");

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    fn expires_at_from_ttl(ttl: Option<Duration>) -> Option<chrono::DateTime<chrono::Utc>> {
        ttl.map(|d| chrono::Utc::now() + d)
    }

    async fn purge_expired(&self, canonical: &str) -> Result<(), StateError> {
        let table = self.config.documents_table();
        let query = format!(
            "DELETE FROM {table} WHERE key = $1 AND expires_at IS NOT NULL AND expires_at <= NOW()"
        );
        sqlx::query(&query)
            .bind(canonical)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for PostgresStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let canonical = key.canonical();
        let table = self.config.documents_table();
        self.purge_expired(&canonical).await?;

        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (key) DO NOTHING"
        );

        let result = sqlx::query(&query)
            .bind(&canonical)
            .bind(value)
            .bind(Self::expires_at_from_ttl(ttl))
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        Ok(self.get_versioned(key).await?.map(|v| v.value))
    }

    async fn get_versioned(&self, key: &StateKey) -> Result<Option<Versioned>, StateError> {
        let table = self.config.documents_table();
        let query = format!(
            "SELECT value, version FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let row: Option<(String, i64)> = sqlx::query_as(&query)
            .bind(key.canonical())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|(value, version)| Versioned {
            value,
            version: to_version(version),
        }))
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let canonical = key.canonical();
        let table = self.config.documents_table();
        self.purge_expired(&canonical).await?;

        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2, 1, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = EXCLUDED.value, \
                 version = {table}.version + 1, \
                 expires_at = EXCLUDED.expires_at"
        );

        sqlx::query(&query)
            .bind(&canonical)
            .bind(value)
            .bind(Self::expires_at_from_ttl(ttl))
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        let table = self.config.documents_table();
        let query = format!(
            "DELETE FROM {table} \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let result = sqlx::query(&query)
            .bind(key.canonical())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_version(
        &self,
        key: &StateKey,
        expected_version: u64,
    ) -> Result<bool, StateError> {
        let table = self.config.documents_table();
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);
        let query = format!(
            "DELETE FROM {table} \
             WHERE key = $1 AND version = $2 \
               AND (expires_at IS NULL OR expires_at > NOW())"
        );

        let result = sqlx::query(&query)
            .bind(key.canonical())
            .bind(expected)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let canonical = key.canonical();
        let table = self.config.documents_table();
        self.purge_expired(&canonical).await?;

        let query = format!(
            "INSERT INTO {table} (key, value, version, expires_at) \
             VALUES ($1, $2::text, 1, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = ({table}.value::bigint + $2)::text, \
                 version = {table}.version + 1, \
                 expires_at = COALESCE(EXCLUDED.expires_at, {table}.expires_at) \
             RETURNING value"
        );

        let row: (String,) = sqlx::query_as(&query)
            .bind(&canonical)
            .bind(delta)
            .bind(Self::expires_at_from_ttl(ttl))
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        row.0
            .parse::<i64>()
            .map_err(|e| StateError::Serialization(e.to_string()))
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let canonical = key.canonical();
        let table = self.config.documents_table();
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);

        // The version predicate makes the update atomic; no row back means
        // someone else wrote first (or the key is gone).
        let update_query = format!(
            "UPDATE {table} \
             SET value = $1, version = version + 1, \
                 expires_at = COALESCE($2, expires_at) \
             WHERE key = $3 AND version = $4 \
               AND (expires_at IS NULL OR expires_at > NOW()) \
             RETURNING version"
        );

        let updated: Option<(i64,)> = sqlx::query_as(&update_query)
            .bind(new_value)
            .bind(Self::expires_at_from_ttl(ttl))
            .bind(&canonical)
            .bind(expected)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        if let Some((version,)) = updated {
            return Ok(CasResult::Ok {
                version: to_version(version),
            });
        }

        Ok(match self.get_versioned(key).await? {
            Some(current) => CasResult::Conflict {
                current_value: Some(current.value),
                current_version: current.version,
            },
            None => CasResult::Conflict {
                current_value: None,
                current_version: 0,
            },
        })
    }

    async fn scan_keys(
        &self,
        office: &str,
        kind: KeyKind,
    ) -> Result<Vec<(String, String)>, StateError> {
        let table = self.config.documents_table();
        let prefix = StateKey::scan_prefix(office, &kind);

        // starts_with avoids LIKE wildcard escaping for office codes.
        let query = format!(
            "SELECT key, value FROM {table} \
             WHERE starts_with(key, $1) AND (expires_at IS NULL OR expires_at > NOW()) \
             ORDER BY key"
        );

        sqlx::query_as(&query)
            .bind(&prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)
    }
}

#[cfg(all(test, feature = "integration"))]
mod tests {
    use permittree_state::testing::run_store_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let url = std::env::var("PERMITTREE_TEST_POSTGRES_URL")
            .unwrap_or_else(|_| "postgres://localhost:5432/permittree_test".into());
        let config = PostgresConfig {
            url,
            table_prefix: format!("t{}_", std::process::id()),
            ..PostgresConfig::default()
        };
        let store = PostgresStateStore::new(config).await.unwrap();
        run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }
}
