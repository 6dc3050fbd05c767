use async_trait::async_trait;
use dashmap::DashMap;

use permittree_audit::error::AuditError;
use permittree_audit::record::{AuditPage, AuditQuery, TransitionRecord};
use permittree_audit::store::AuditStore;

/// In-memory audit store using `DashMap`. Suitable for development and testing.
///
/// Records are keyed by record ID, with a secondary index from application
/// ID to record IDs in insertion order.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: DashMap<String, TransitionRecord>,
    application_index: DashMap<String, Vec<String>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, entry: TransitionRecord) -> Result<(), AuditError> {
        let id = entry.id.clone();
        let application_id = entry.application_id.clone();
        self.records.insert(id.clone(), entry);
        self.application_index
            .entry(application_id)
            .or_default()
            .push(id);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<TransitionRecord>, AuditError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn history(&self, application_id: &str) -> Result<Vec<TransitionRecord>, AuditError> {
        let Some(ids) = self.application_index.get(application_id) else {
            return Ok(Vec::new());
        };
        let mut records: Vec<TransitionRecord> = ids
            .value()
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.value().clone()))
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(records)
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        query.validate()?;
        let limit = query.effective_limit();
        let offset = query.effective_offset();

        let mut matching: Vec<TransitionRecord> = self
            .records
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

        let total = matching.len() as u64;
        let records: Vec<TransitionRecord> = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(AuditPage {
            records,
            total,
            limit,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use permittree_audit::record::{AuditQuery, AuditSubject, TransitionRecord};
    use permittree_audit::store::AuditStore;

    use super::MemoryAuditStore;

    fn make_record(
        application_id: &str,
        event: &str,
        actor: &str,
        age_secs: i64,
    ) -> TransitionRecord {
        let mut rec = TransitionRecord::new(
            "PENRO",
            AuditSubject::Application,
            application_id,
            application_id,
            event,
            "Submitted",
            "Accepted",
            actor,
            "clerk",
        );
        rec.recorded_at = Utc::now() - Duration::seconds(age_secs);
        rec
    }

    #[tokio::test]
    async fn record_and_get_by_id() {
        let store = MemoryAuditStore::new();
        let rec = make_record("app-1", "accept", "maria", 0);
        let id = rec.id.clone();
        store.record(rec.clone()).await.unwrap();

        assert_eq!(store.get_by_id(&id).await.unwrap(), Some(rec));
        assert!(store.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_is_oldest_first() {
        let store = MemoryAuditStore::new();
        store.record(make_record("app-1", "endorse", "tech", 10)).await.unwrap();
        store.record(make_record("app-1", "submit", "juan", 30)).await.unwrap();
        store.record(make_record("app-2", "submit", "pedro", 20)).await.unwrap();
        store.record(make_record("app-1", "accept", "maria", 20)).await.unwrap();

        let events: Vec<String> = store
            .history("app-1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.event)
            .collect();
        assert_eq!(events, vec!["submit", "accept", "endorse"]);
        assert!(store.history("app-9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_filters_and_paginates_newest_first() {
        let store = MemoryAuditStore::new();
        for i in 0..5 {
            store
                .record(make_record(&format!("app-{i}"), "accept", "maria", i))
                .await
                .unwrap();
        }
        store.record(make_record("app-x", "reject", "chief", 0)).await.unwrap();

        let page = store
            .query(&AuditQuery {
                actor: Some("maria".into()),
                limit: Some(2),
                offset: Some(1),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].application_id, "app-1");
        assert_eq!(page.records[1].application_id, "app-2");

        let page = store
            .query(&AuditQuery {
                event: Some("reject".into()),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 50);
    }
}
