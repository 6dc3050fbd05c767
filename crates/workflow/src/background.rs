//! Periodic payment reminders.
//!
//! Applicants whose order of payment is past due get one reminder per order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use permittree_core::{
    Notification, NotificationKind, OrderOfPayment, Recipient, format_pesos,
};

use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// Actor name used for notifications raised by the system itself.
const SYSTEM_ACTOR: &str = "system";

impl Workflow {
    /// Notify owners of overdue, unpaid orders of payment that have not been
    /// reminded yet. Returns the number of reminders sent.
    ///
    /// An order that cannot be claimed is skipped with a warning and picked
    /// up again by the next sweep.
    pub async fn remind_overdue_payments(
        &self,
        now: DateTime<Utc>,
    ) -> Result<usize, WorkflowError> {
        let overdue: Vec<OrderOfPayment> = self
            .scan::<OrderOfPayment>()
            .await?
            .into_iter()
            .filter(|oop| oop.is_overdue(now) && !oop.reminder_sent)
            .collect();
        if overdue.is_empty() {
            return Ok(0);
        }
        debug!(count = overdue.len(), "overdue orders of payment");

        let mut sent = 0;
        for oop in overdue {
            let claim = self
                .modify::<OrderOfPayment, _, _>(&oop.id, |oop| {
                    // Paid or reminded since the scan.
                    if !oop.is_overdue(now) || oop.reminder_sent {
                        return Ok(false);
                    }
                    oop.reminder_sent = true;
                    oop.updated_at = now;
                    Ok(true)
                })
                .await;
            let oop = match claim {
                Ok((oop, true)) => oop,
                Ok((_, false)) => continue,
                Err(e) => {
                    // Left unclaimed; the next sweep tries again.
                    warn!(oop_id = %oop.id, error = %e, "could not claim payment reminder");
                    continue;
                }
            };

            let message = format!(
                "Payment of {} for order of payment {} (application {}) was due on {}",
                format_pesos(oop.total_centavos),
                oop.control_number,
                oop.custom_id,
                oop.due_at.format("%B %-d, %Y"),
            );
            let notification = Notification::new(
                Recipient::user(oop.owner.clone()),
                NotificationKind::PaymentReminder,
                Some(oop.application_id.clone()),
                message,
                now,
            )
            .with_metadata(serde_json::json!({
                "oop_id": oop.id,
                "control_number": oop.control_number,
                "due_at": oop.due_at,
            }));
            self.notify(SYSTEM_ACTOR, notification).await;
            sent += 1;
        }

        info!(sent, "payment reminders sent");
        Ok(sent)
    }
}

/// Runs [`Workflow::remind_overdue_payments`] on a fixed interval until
/// shut down.
pub struct ReminderTask {
    workflow: Arc<Workflow>,
    every: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ReminderTask {
    /// Create the task and the sender that stops it.
    pub fn new(workflow: Arc<Workflow>, every: Duration) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            Self {
                workflow,
                every,
                shutdown_rx,
            },
            shutdown_tx,
        )
    }

    pub async fn run(mut self) {
        info!(interval_secs = self.every.as_secs(), "payment reminder task started");
        let mut ticker = interval(self.every);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("payment reminder task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.workflow.remind_overdue_payments(Utc::now()).await {
                        error!(error = %e, "error sending payment reminders");
                    }
                }
            }
        }

        info!("payment reminder task stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use permittree_core::{OopStatus, Role};
    use permittree_state::{CasResult, KeyKind, StateError, StateKey, StateStore, Versioned};
    use permittree_state_memory::MemoryStateStore;

    use crate::testing::{Harness, signed_order};

    use super::*;

    /// Memory store whose writes to one order of payment fail.
    #[derive(Default)]
    struct BrokenOrderStore {
        inner: MemoryStateStore,
        broken: Mutex<Option<String>>,
    }

    impl BrokenOrderStore {
        fn break_order(&self, id: Option<&str>) {
            *self.broken.lock().unwrap() = id.map(str::to_owned);
        }
    }

    #[async_trait]
    impl StateStore for BrokenOrderStore {
        async fn check_and_set(
            &self,
            key: &StateKey,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<bool, StateError> {
            self.inner.check_and_set(key, value, ttl).await
        }

        async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
            self.inner.get(key).await
        }

        async fn get_versioned(&self, key: &StateKey) -> Result<Option<Versioned>, StateError> {
            self.inner.get_versioned(key).await
        }

        async fn set(
            &self,
            key: &StateKey,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<(), StateError> {
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
            self.inner.delete(key).await
        }

        async fn increment(
            &self,
            key: &StateKey,
            delta: i64,
            ttl: Option<Duration>,
        ) -> Result<i64, StateError> {
            self.inner.increment(key, delta, ttl).await
        }

        async fn compare_and_swap(
            &self,
            key: &StateKey,
            expected_version: u64,
            new_value: &str,
            ttl: Option<Duration>,
        ) -> Result<CasResult, StateError> {
            let broken = self.broken.lock().unwrap().clone();
            if key.kind == KeyKind::OrderOfPayment && broken.as_ref() == Some(&key.id) {
                return Err(StateError::Backend("disk full".into()));
            }
            self.inner
                .compare_and_swap(key, expected_version, new_value, ttl)
                .await
        }

        async fn delete_if_version(
            &self,
            key: &StateKey,
            expected_version: u64,
        ) -> Result<bool, StateError> {
            self.inner.delete_if_version(key, expected_version).await
        }

        async fn scan_keys(
            &self,
            office: &str,
            kind: KeyKind,
        ) -> Result<Vec<(String, String)>, StateError> {
            self.inner.scan_keys(office, kind).await
        }
    }

    #[tokio::test]
    async fn one_failing_order_does_not_stop_the_sweep() {
        let store = Arc::new(BrokenOrderStore::default());
        let h = Harness::with_state(Arc::clone(&store) as Arc<dyn StateStore>);
        let (_, first) = signed_order(&h).await;
        let (_, second) = signed_order(&h).await;
        store.break_order(Some(first.id.as_str()));

        let later = Utc::now() + ChronoDuration::days(30);
        assert_eq!(h.workflow.remind_overdue_payments(later).await.unwrap(), 1);
        let second = h
            .workflow
            .get_order_of_payment(&h.owner, &second.id)
            .await
            .unwrap();
        assert!(second.reminder_sent);

        store.break_order(None);
        assert_eq!(h.workflow.remind_overdue_payments(later).await.unwrap(), 1);
        let first = h
            .workflow
            .get_order_of_payment(&h.owner, &first.id)
            .await
            .unwrap();
        assert!(first.reminder_sent);
    }

    #[tokio::test]
    async fn reminds_once_per_overdue_order() {
        let h = Harness::new();
        let (_, oop) = signed_order(&h).await;
        assert_eq!(oop.status, OopStatus::AwaitingPayment);

        assert_eq!(h.workflow.remind_overdue_payments(Utc::now()).await.unwrap(), 0);

        let later = Utc::now() + ChronoDuration::days(30);
        assert_eq!(h.workflow.remind_overdue_payments(later).await.unwrap(), 1);
        assert_eq!(h.workflow.remind_overdue_payments(later).await.unwrap(), 0);

        let inbox = h.workflow.list_notifications(&h.owner, true).await.unwrap();
        let reminders: Vec<_> = inbox
            .iter()
            .filter(|n| n.kind == NotificationKind::PaymentReminder)
            .collect();
        assert_eq!(reminders.len(), 1);
        assert!(reminders[0].message.contains("₱536.00"));

        let oop = h
            .workflow
            .get_order_of_payment(&h.owner, &oop.id)
            .await
            .unwrap();
        assert!(oop.reminder_sent);
    }

    #[tokio::test]
    async fn unsigned_orders_are_not_overdue() {
        let h = Harness::new();
        let app = crate::testing::at_accounting(&h).await;
        h.workflow
            .issue_order_of_payment(&h.personnel(Role::Accountant), &app.id, None)
            .await
            .unwrap();

        let later = Utc::now() + ChronoDuration::days(30);
        assert_eq!(h.workflow.remind_overdue_payments(later).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn task_stops_on_shutdown() {
        let h = Harness::new();
        let (task, shutdown_tx) = ReminderTask::new(Arc::new(h.workflow), Duration::from_secs(60));
        let handle = tokio::spawn(task.run());

        shutdown_tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
