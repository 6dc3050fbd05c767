//! Typed JSON documents on top of the key/value [`StateStore`].
//!
//! Every mutation goes through [`Workflow::modify`]: read the document and
//! its version, apply the change, then compare-and-swap. A lost race re-reads
//! and re-applies the change, so validation inside the closure always sees
//! the latest document.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use permittree_core::{Application, Certificate, Notification, OrderOfPayment};
use permittree_state::{CasResult, KeyKind, StateKey};

use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// Attempts made by [`Workflow::modify`] before giving up with a conflict.
pub const MAX_CAS_ATTEMPTS: usize = 3;

/// A document stored under its own key kind.
pub(crate) trait Document: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Human-readable name used in errors.
    const LABEL: &'static str;

    fn kind() -> KeyKind;

    fn id(&self) -> &str;

    /// Store the storage version on the in-memory copy.
    fn set_version(&mut self, _version: u64) {}
}

impl Document for Application {
    const LABEL: &'static str = "application";

    fn kind() -> KeyKind {
        KeyKind::Application
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Document for OrderOfPayment {
    const LABEL: &'static str = "order of payment";

    fn kind() -> KeyKind {
        KeyKind::OrderOfPayment
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Document for Certificate {
    const LABEL: &'static str = "certificate";

    fn kind() -> KeyKind {
        KeyKind::Certificate
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Document for Notification {
    const LABEL: &'static str = "notification";

    fn kind() -> KeyKind {
        KeyKind::Notification
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Workflow {
    pub(crate) fn key(&self, kind: KeyKind, id: &str) -> StateKey {
        StateKey::new(self.config.office.clone(), kind, id)
    }

    /// Load a document with its current version.
    pub(crate) async fn load<T: Document>(&self, id: &str) -> Result<Option<T>, WorkflowError> {
        let key = self.key(T::kind(), id);
        let Some(stored) = self.state.get_versioned(&key).await? else {
            return Ok(None);
        };
        let mut doc: T = serde_json::from_str(&stored.value)?;
        doc.set_version(stored.version);
        Ok(Some(doc))
    }

    /// Like [`load`](Self::load), failing with `NotFound` for a missing id.
    pub(crate) async fn fetch<T: Document>(&self, id: &str) -> Result<T, WorkflowError> {
        self.load(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("{} {id}", T::LABEL)))
    }

    /// Store a brand-new document. Fails if the id is already taken.
    pub(crate) async fn insert<T: Document>(&self, doc: &mut T) -> Result<(), WorkflowError> {
        let key = self.key(T::kind(), doc.id());
        let json = serde_json::to_string(doc)?;
        if !self.state.check_and_set(&key, &json, None).await? {
            return Err(WorkflowError::Conflict(format!(
                "{} {} already exists",
                T::LABEL,
                doc.id()
            )));
        }
        doc.set_version(1);
        Ok(())
    }

    /// Remove a document. Returns whether it existed.
    pub(crate) async fn remove<T: Document>(&self, id: &str) -> Result<bool, WorkflowError> {
        Ok(self.state.delete(&self.key(T::kind(), id)).await?)
    }

    /// Remove a document only if it still has `version`. Returns whether it
    /// was removed.
    pub(crate) async fn remove_if_version<T: Document>(
        &self,
        id: &str,
        version: u64,
    ) -> Result<bool, WorkflowError> {
        Ok(self
            .state
            .delete_if_version(&self.key(T::kind(), id), version)
            .await?)
    }

    /// Read-modify-write a document under optimistic concurrency.
    ///
    /// `change` may run more than once; it must only touch the document it is
    /// given. Its error aborts the update without writing.
    pub(crate) async fn modify<T, R, F>(
        &self,
        id: &str,
        mut change: F,
    ) -> Result<(T, R), WorkflowError>
    where
        T: Document,
        R: Send,
        F: FnMut(&mut T) -> Result<R, WorkflowError> + Send,
    {
        let key = self.key(T::kind(), id);
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some(stored) = self.state.get_versioned(&key).await? else {
                return Err(WorkflowError::NotFound(format!("{} {id}", T::LABEL)));
            };
            let expected = stored.version;
            let mut doc: T = serde_json::from_str(&stored.value)?;

            let outcome = change(&mut doc)?;
            let json = serde_json::to_string(&doc)?;
            match self
                .state
                .compare_and_swap(&key, expected, &json, None)
                .await?
            {
                CasResult::Ok { version } => {
                    doc.set_version(version);
                    return Ok((doc, outcome));
                }
                CasResult::Conflict {
                    current_version, ..
                } => {
                    debug!(
                        key = %key,
                        attempt,
                        expected,
                        current_version,
                        "version conflict, retrying"
                    );
                }
            }
        }
        Err(WorkflowError::Conflict(format!(
            "{} {id} was modified concurrently, try again",
            T::LABEL
        )))
    }

    /// Every document of kind `T` in this office, in key order.
    pub(crate) async fn scan<T: Document>(&self) -> Result<Vec<T>, WorkflowError> {
        self.state
            .scan_keys(&self.config.office, T::kind())
            .await?
            .into_iter()
            .map(|(_, value)| serde_json::from_str(&value).map_err(WorkflowError::from))
            .collect()
    }

    /// Allocate the next number of a per-year sequence, e.g. `CSAW-2025`.
    pub(crate) async fn next_sequence(&self, sequence: &str) -> Result<i64, WorkflowError> {
        let key = self.key(KeyKind::Counter, sequence);
        Ok(self.state.increment(&key, 1, None).await?)
    }
}
