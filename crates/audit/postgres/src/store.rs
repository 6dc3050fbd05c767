use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

use permittree_audit::error::AuditError;
use permittree_audit::record::{AuditPage, AuditQuery, AuditSubject, TransitionRecord};
use permittree_audit::store::AuditStore;

use crate::config::PostgresAuditConfig;
use crate::migrations;

fn storage(e: sqlx::Error) -> AuditError {
    AuditError::Storage(e.to_string())
}

/// Postgres-backed audit store using `sqlx`.
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

impl PostgresAuditStore {
    /// Create a new store, connecting to Postgres and running migrations.
    pub async fn new(config: &PostgresAuditConfig) -> Result<Self, AuditError> {
        let pool = PgPool::connect(&config.url).await.map_err(storage)?;
        Self::from_pool(pool, &config.prefix).await
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: PgPool, prefix: &str) -> Result<Self, AuditError> {
        migrations::run_migrations(&pool, prefix)
            .await
            .map_err(storage)?;

        Ok(Self {
            pool,
            table: format!("{prefix}transitions"),
        })
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn record(&self, entry: TransitionRecord) -> Result<(), AuditError> {
        let sql = format!(
            r"
            INSERT INTO {} (
                id, office, subject, subject_id, application_id, event,
                from_status, to_status, from_stage, to_stage,
                actor, actor_role, remarks, recorded_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10,
                $11, $12, $13, $14
            )
            ",
            self.table
        );

        sqlx::query(&sql)
            .bind(&entry.id)
            .bind(&entry.office)
            .bind(entry.subject.as_str())
            .bind(&entry.subject_id)
            .bind(&entry.application_id)
            .bind(&entry.event)
            .bind(&entry.from_status)
            .bind(&entry.to_status)
            .bind(&entry.from_stage)
            .bind(&entry.to_stage)
            .bind(&entry.actor)
            .bind(&entry.actor_role)
            .bind(&entry.remarks)
            .bind(entry.recorded_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<TransitionRecord>, AuditError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.table);

        let row = sqlx::query_as::<_, TransitionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn history(&self, application_id: &str) -> Result<Vec<TransitionRecord>, AuditError> {
        let sql = format!(
            "SELECT * FROM {} WHERE application_id = $1 ORDER BY recorded_at ASC, id ASC",
            self.table
        );

        let rows = sqlx::query_as::<_, TransitionRow>(&sql)
            .bind(application_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        query.validate()?;
        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let (where_clause, binds) = build_where_clause(query);

        let count_sql = format!("SELECT COUNT(*) FROM {} {where_clause}", self.table);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for b in &binds {
            count_q = match b {
                Bind::Text(v) => count_q.bind(v),
                Bind::Time(v) => count_q.bind(*v),
            };
        }
        let total = count_q.fetch_one(&self.pool).await.map_err(storage)?;

        let limit_idx = binds.len() + 1;
        let offset_idx = binds.len() + 2;
        let data_sql = format!(
            "SELECT * FROM {} {where_clause} ORDER BY recorded_at DESC \
             LIMIT ${limit_idx} OFFSET ${offset_idx}",
            self.table
        );

        let mut data_q = sqlx::query_as::<_, TransitionRow>(&data_sql);
        for b in &binds {
            data_q = match b {
                Bind::Text(v) => data_q.bind(v),
                Bind::Time(v) => data_q.bind(*v),
            };
        }
        let rows: Vec<TransitionRow> = data_q
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        let records = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AuditPage {
            records,
            total: u64::try_from(total).unwrap_or(0),
            limit,
            offset,
        })
    }
}

enum Bind {
    Text(String),
    Time(DateTime<Utc>),
}

/// Build the WHERE clause and positional bind values for a query.
fn build_where_clause(query: &AuditQuery) -> (String, Vec<Bind>) {
    let mut conditions = Vec::new();
    let mut binds: Vec<Bind> = Vec::new();

    let subject = query.subject.map(|s| s.as_str().to_owned());
    let fields: [(Option<&String>, &str); 5] = [
        (query.office.as_ref(), "office"),
        (query.application_id.as_ref(), "application_id"),
        (subject.as_ref(), "subject"),
        (query.event.as_ref(), "event"),
        (query.actor.as_ref(), "actor"),
    ];

    for (value, col) in fields {
        if let Some(v) = value {
            binds.push(Bind::Text(v.clone()));
            conditions.push(format!("{col} = ${}", binds.len()));
        }
    }

    if let Some(from) = query.from {
        binds.push(Bind::Time(from));
        conditions.push(format!("recorded_at >= ${}", binds.len()));
    }
    if let Some(to) = query.to {
        binds.push(Bind::Time(to));
        conditions.push(format!("recorded_at <= ${}", binds.len()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, binds)
}

#[derive(sqlx::FromRow)]
struct TransitionRow {
    id: String,
    office: String,
    subject: String,
    subject_id: String,
    application_id: String,
    event: String,
    from_status: String,
    to_status: String,
    from_stage: Option<String>,
    to_stage: Option<String>,
    actor: String,
    actor_role: String,
    remarks: Option<String>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<TransitionRow> for TransitionRecord {
    type Error = AuditError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        let Some(subject) = AuditSubject::parse(&row.subject) else {
            warn!(id = %row.id, subject = %row.subject, "unknown audit subject");
            return Err(AuditError::Serialization(format!(
                "unknown subject: {}",
                row.subject
            )));
        };
        Ok(Self {
            id: row.id,
            office: row.office,
            subject,
            subject_id: row.subject_id,
            application_id: row.application_id,
            event: row.event,
            from_status: row.from_status,
            to_status: row.to_status,
            from_stage: row.from_stage,
            to_stage: row.to_stage,
            actor: row.actor,
            actor_role: row.actor_role,
            remarks: row.remarks,
            recorded_at: row.recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_numbers_binds_in_order() {
        let query = AuditQuery {
            application_id: Some("app-1".into()),
            actor: Some("maria".into()),
            from: Some(Utc::now()),
            ..AuditQuery::default()
        };
        let (clause, binds) = build_where_clause(&query);
        assert_eq!(
            clause,
            "WHERE application_id = $1 AND actor = $2 AND recorded_at >= $3"
        );
        assert_eq!(binds.len(), 3);
    }

    #[test]
    fn empty_query_has_no_where_clause() {
        let (clause, binds) = build_where_clause(&AuditQuery::default());
        assert!(clause.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn subject_filter_uses_wire_name() {
        let query = AuditQuery {
            subject: Some(AuditSubject::OrderOfPayment),
            ..AuditQuery::default()
        };
        let (clause, binds) = build_where_clause(&query);
        assert_eq!(clause, "WHERE subject = $1");
        assert!(matches!(&binds[0], Bind::Text(s) if s == "order_of_payment"));
    }
}
