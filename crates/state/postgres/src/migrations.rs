use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Create the documents table and its key-prefix index if they do not exist.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let table = config.documents_table();

    let create_documents = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            version BIGINT NOT NULL DEFAULT 1,
            expires_at TIMESTAMPTZ
        )"
    );

    // text_pattern_ops lets prefix scans use the index.
    let create_prefix_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}documents_key_prefix_idx ON {table} (key text_pattern_ops)",
        config.table_prefix
    );

    sqlx::query(&create_documents).execute(pool).await?;
    sqlx::query(&create_prefix_idx).execute(pool).await?;

    Ok(())
}
