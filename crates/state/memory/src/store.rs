use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use permittree_state::error::StateError;
use permittree_state::key::{KeyKind, StateKey};
use permittree_state::store::{CasResult, StateStore, Versioned};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    version: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

fn expiry_from_ttl(ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|d| Instant::now() + d)
}

/// In-memory [`StateStore`] backed by a [`DashMap`].
///
/// Entries are lazily evicted on read when their TTL has elapsed. Nothing
/// survives a restart; use it for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    data: DashMap<String, Entry>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let rendered = key.canonical();

        self.data
            .remove_if(&rendered, |_, entry| entry.is_expired());

        let was_inserted = match self.data.entry(rendered) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: value.to_owned(),
                    version: 1,
                    expires_at: expiry_from_ttl(ttl),
                });
                true
            }
        };

        Ok(was_inserted)
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        Ok(self.get_versioned(key).await?.map(|v| v.value))
    }

    async fn get_versioned(&self, key: &StateKey) -> Result<Option<Versioned>, StateError> {
        let rendered = key.canonical();

        if let Some(entry) = self.data.get(&rendered) {
            if entry.is_expired() {
                drop(entry);
                self.data
                    .remove_if(&rendered, |_, entry| entry.is_expired());
                return Ok(None);
            }
            return Ok(Some(Versioned {
                value: entry.value.clone(),
                version: entry.version,
            }));
        }

        Ok(None)
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let rendered = key.canonical();
        let expires_at = expiry_from_ttl(ttl);

        self.data
            .remove_if(&rendered, |_, entry| entry.is_expired());

        self.data
            .entry(rendered)
            .and_modify(|entry| {
                value.clone_into(&mut entry.value);
                entry.version += 1;
                entry.expires_at = expires_at;
            })
            .or_insert_with(|| Entry {
                value: value.to_owned(),
                version: 1,
                expires_at,
            });

        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        match self.data.remove(&key.canonical()) {
            Some((_, entry)) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        let rendered = key.canonical();
        let expires_at = expiry_from_ttl(ttl);

        self.data
            .remove_if(&rendered, |_, entry| entry.is_expired());

        let mut entry = self.data.entry(rendered).or_insert_with(|| Entry {
            value: "0".to_owned(),
            version: 0,
            expires_at,
        });

        let current: i64 = entry
            .value
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                StateError::Serialization(format!("counter value is not an integer: {e}"))
            })?;

        let new_value = current + delta;
        entry.value = new_value.to_string();
        entry.version += 1;
        if let Some(ea) = expires_at {
            entry.expires_at = Some(ea);
        }

        Ok(new_value)
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let rendered = key.canonical();

        self.data
            .remove_if(&rendered, |_, entry| entry.is_expired());

        let Some(mut entry) = self.data.get_mut(&rendered) else {
            return Ok(CasResult::Conflict {
                current_value: None,
                current_version: 0,
            });
        };

        if entry.version != expected_version {
            return Ok(CasResult::Conflict {
                current_value: Some(entry.value.clone()),
                current_version: entry.version,
            });
        }

        new_value.clone_into(&mut entry.value);
        entry.version += 1;
        entry.expires_at = expiry_from_ttl(ttl).or(entry.expires_at);

        Ok(CasResult::Ok {
            version: entry.version,
        })
    }

    async fn delete_if_version(
        &self,
        key: &StateKey,
        expected_version: u64,
    ) -> Result<bool, StateError> {
        let removed = self.data.remove_if(&key.canonical(), |_, entry| {
            !entry.is_expired() && entry.version == expected_version
        });
        Ok(removed.is_some())
    }

    async fn scan_keys(
        &self,
        office: &str,
        kind: KeyKind,
    ) -> Result<Vec<(String, String)>, StateError> {
        let prefix = StateKey::scan_prefix(office, &kind);
        let mut entries: Vec<(String, String)> = self
            .data
            .iter()
            .filter(|e| e.key().starts_with(&prefix) && !e.value().is_expired())
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use permittree_state::key::{KeyKind, StateKey};
    use permittree_state::testing::run_store_conformance_tests;

    use super::*;

    fn test_key(kind: KeyKind, id: &str) -> StateKey {
        StateKey::new("test-office", kind, id)
    }

    #[tokio::test]
    async fn conformance() {
        let store = MemoryStateStore::new();
        run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_via_get() {
        let store = MemoryStateStore::new();
        let key = test_key(KeyKind::Token, "ttl-expire");

        store
            .set(&key, "short-lived", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        let val = store.get(&key).await.unwrap();
        assert_eq!(val.as_deref(), Some("short-lived"));

        tokio::time::advance(Duration::from_secs(6)).await;

        let val = store.get(&key).await.unwrap();
        assert!(val.is_none(), "value should be expired");
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_not_scanned() {
        let store = MemoryStateStore::new();
        store
            .set(
                &test_key(KeyKind::Token, "old"),
                "x",
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap();
        store
            .set(&test_key(KeyKind::Token, "fresh"), "y", None)
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        let entries = store.scan_keys("test-office", KeyKind::Token).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "test-office:token:fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn check_and_set_after_expiry() {
        let store = MemoryStateStore::new();
        let key = test_key(KeyKind::User, "ttl-csa");

        let created = store
            .check_and_set(&key, "v1", Some(Duration::from_secs(3)))
            .await
            .unwrap();
        assert!(created);

        let created = store.check_and_set(&key, "v2", None).await.unwrap();
        assert!(!created);

        tokio::time::advance(Duration::from_secs(4)).await;

        let created = store.check_and_set(&key, "v2", None).await.unwrap();
        assert!(created, "should re-create after expiry");

        let val = store.get(&key).await.unwrap();
        assert_eq!(val.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn concurrent_cas_has_one_winner() {
        let store = Arc::new(MemoryStateStore::new());
        let key = test_key(KeyKind::Application, "contended");
        store.check_and_set(&key, "v1", None).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_swap(&key, 1, &format!("writer-{i}"), None)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), CasResult::Ok { .. }) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        let v = store.get_versioned(&key).await.unwrap().unwrap();
        assert_eq!(v.version, 2);
    }
}
