use sqlx::PgPool;

/// Create the transitions table and its indexes if they do not exist.
pub async fn run_migrations(pool: &PgPool, prefix: &str) -> Result<(), sqlx::Error> {
    let table = format!("{prefix}transitions");

    let create_table = format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
            id              TEXT PRIMARY KEY,
            office          TEXT NOT NULL,
            subject         TEXT NOT NULL,
            subject_id      TEXT NOT NULL,
            application_id  TEXT NOT NULL,
            event           TEXT NOT NULL,
            from_status     TEXT NOT NULL,
            to_status       TEXT NOT NULL,
            from_stage      TEXT,
            to_stage        TEXT,
            actor           TEXT NOT NULL,
            actor_role      TEXT NOT NULL,
            remarks         TEXT,
            recorded_at     TIMESTAMPTZ NOT NULL
        )
        "
    );

    sqlx::query(&create_table).execute(pool).await?;

    let indexes = [
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}transitions_application \
             ON {table} (application_id, recorded_at)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}transitions_office_time \
             ON {table} (office, recorded_at DESC)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}transitions_actor \
             ON {table} (actor, recorded_at DESC)"
        ),
    ];

    for idx in &indexes {
        sqlx::query(idx).execute(pool).await?;
    }

    Ok(())
}
