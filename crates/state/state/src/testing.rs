use std::time::Duration;

use crate::error::StateError;
use crate::key::{KeyKind, StateKey};
use crate::store::{CasResult, StateStore};

fn test_key(kind: KeyKind, id: &str) -> StateKey {
    StateKey::new("test-office", kind, id)
}

/// Run the full state store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn StateStore) -> Result<(), StateError> {
    test_get_missing(store).await?;
    test_set_and_get(store).await?;
    test_check_and_set_new(store).await?;
    test_check_and_set_existing(store).await?;
    test_delete(store).await?;
    test_increment(store).await?;
    test_versions_start_at_one(store).await?;
    test_compare_and_swap(store).await?;
    test_compare_and_swap_missing(store).await?;
    test_delete_if_version(store).await?;
    test_scan_keys(store).await?;
    test_ttl_set(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Application, "missing");
    let val = store.get(&key).await?;
    assert!(val.is_none(), "get on missing key should return None");
    let val = store.get_versioned(&key).await?;
    assert!(val.is_none(), "get_versioned on missing key should return None");
    Ok(())
}

async fn test_set_and_get(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Application, "set-get");
    store.set(&key, "hello", None).await?;
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("hello"));
    Ok(())
}

async fn test_check_and_set_new(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::User, "csa-new");
    let created = store.check_and_set(&key, "v1", None).await?;
    assert!(created, "check_and_set on new key should return true");
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"));
    Ok(())
}

async fn test_check_and_set_existing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::User, "csa-existing");
    store.set(&key, "v1", None).await?;
    let created = store.check_and_set(&key, "v2", None).await?;
    assert!(
        !created,
        "check_and_set on existing key should return false"
    );
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"), "original value should remain");
    Ok(())
}

async fn test_delete(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Blob, "to-delete");
    store.set(&key, "bye", None).await?;
    let existed = store.delete(&key).await?;
    assert!(existed, "delete should return true for existing key");
    let val = store.get(&key).await?;
    assert!(val.is_none(), "get after delete should return None");

    let existed = store.delete(&key).await?;
    assert!(!existed, "delete on missing key should return false");
    Ok(())
}

async fn test_increment(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Counter, "CSAW-2025");
    let val = store.increment(&key, 1, None).await?;
    assert_eq!(val, 1, "first increment from zero should yield 1");

    let val = store.increment(&key, 5, None).await?;
    assert_eq!(val, 6, "second increment should accumulate");

    let val = store.increment(&key, -2, None).await?;
    assert_eq!(val, 4, "negative delta should decrement");
    Ok(())
}

async fn test_versions_start_at_one(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Certificate, "versioned");
    assert!(store.check_and_set(&key, "a", None).await?);
    let v = store.get_versioned(&key).await?.expect("value was just set");
    assert_eq!(v.version, 1, "new documents start at version 1");
    assert_eq!(v.value, "a");

    store.set(&key, "b", None).await?;
    let v = store.get_versioned(&key).await?.expect("value was just set");
    assert_eq!(v.version, 2, "each write bumps the version by one");
    Ok(())
}

async fn test_compare_and_swap(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::OrderOfPayment, "cas-version");

    store.set(&key, "initial", None).await?;

    // Wrong version.
    let result = store.compare_and_swap(&key, 999, "updated", None).await?;
    assert_eq!(
        result,
        CasResult::Conflict {
            current_value: Some("initial".to_owned()),
            current_version: 1,
        },
        "CAS with wrong version should conflict"
    );

    let result = store.compare_and_swap(&key, 1, "updated", None).await?;
    assert_eq!(
        result,
        CasResult::Ok { version: 2 },
        "CAS with correct version should succeed"
    );

    // A second writer holding the old version loses.
    let result = store.compare_and_swap(&key, 1, "stale", None).await?;
    assert!(
        matches!(result, CasResult::Conflict { current_version: 2, .. }),
        "CAS with a stale version should conflict"
    );

    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("updated"));
    Ok(())
}

async fn test_compare_and_swap_missing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::OrderOfPayment, "cas-missing");
    let result = store.compare_and_swap(&key, 1, "x", None).await?;
    assert_eq!(
        result,
        CasResult::Conflict {
            current_value: None,
            current_version: 0,
        }
    );
    assert!(store.get(&key).await?.is_none());
    Ok(())
}

async fn test_delete_if_version(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Application, "delete-versioned");
    store.set(&key, "v1", None).await?;
    store.set(&key, "v2", None).await?;

    let deleted = store.delete_if_version(&key, 1).await?;
    assert!(!deleted, "stale version must not delete");
    assert_eq!(store.get(&key).await?.as_deref(), Some("v2"));

    let deleted = store.delete_if_version(&key, 2).await?;
    assert!(deleted, "matching version should delete");
    assert!(store.get(&key).await?.is_none());

    let deleted = store.delete_if_version(&key, 2).await?;
    assert!(!deleted, "missing key should report false");
    Ok(())
}

async fn test_scan_keys(store: &dyn StateStore) -> Result<(), StateError> {
    let office = "scan-office";
    store
        .set(&StateKey::new(office, KeyKind::Notification, "n2"), "two", None)
        .await?;
    store
        .set(&StateKey::new(office, KeyKind::Notification, "n1"), "one", None)
        .await?;
    store
        .set(&StateKey::new(office, KeyKind::User, "n3"), "other kind", None)
        .await?;
    store
        .set(
            &StateKey::new("other-office", KeyKind::Notification, "n4"),
            "other office",
            None,
        )
        .await?;

    let entries = store.scan_keys(office, KeyKind::Notification).await?;
    assert_eq!(
        entries,
        vec![
            ("scan-office:notification:n1".to_owned(), "one".to_owned()),
            ("scan-office:notification:n2".to_owned(), "two".to_owned()),
        ],
        "scan should return only the requested office and kind, ordered by key"
    );

    let entries = store.scan_keys(office, KeyKind::Certificate).await?;
    assert!(entries.is_empty());
    Ok(())
}

async fn test_ttl_set(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Token, "ttl-test");
    store
        .set(&key, "ephemeral", Some(Duration::from_secs(3600)))
        .await?;
    let val = store.get(&key).await?;
    assert_eq!(val.as_deref(), Some("ephemeral"));
    Ok(())
}
