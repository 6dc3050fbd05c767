//! In-app notifications.
//!
//! Notifications are plain documents in the state store. Clients poll for
//! them; nothing is pushed.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use permittree_core::{
    Application, ApplicationEvent, Caller, Notification, NotificationId, NotificationKind,
    Recipient, Role,
};

use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// The number an application is known by: its custom id once submitted.
pub(crate) fn label(app: &Application) -> &str {
    app.custom_id.as_deref().unwrap_or(app.id.as_str())
}

fn kind_for(event: ApplicationEvent) -> NotificationKind {
    match event {
        ApplicationEvent::Submit | ApplicationEvent::Resubmit => {
            NotificationKind::ApplicationSubmitted
        }
        ApplicationEvent::Return => NotificationKind::ApplicationReturned,
        ApplicationEvent::Accept => NotificationKind::ApplicationAccepted,
        ApplicationEvent::Endorse => NotificationKind::ApplicationEndorsed,
        ApplicationEvent::IssueOop => NotificationKind::OrderOfPaymentIssued,
        ApplicationEvent::ConfirmPayment => NotificationKind::PaymentConfirmed,
        ApplicationEvent::GenerateCertificate => NotificationKind::CertificateGenerated,
        ApplicationEvent::SignCertificate => NotificationKind::CertificateSigned,
        ApplicationEvent::Release => NotificationKind::PermitReleased,
        ApplicationEvent::Reject => NotificationKind::ApplicationRejected,
        ApplicationEvent::Withdraw => NotificationKind::ApplicationWithdrawn,
    }
}

fn message_for(event: ApplicationEvent, app: &Application) -> String {
    let label = label(app);
    let remarks = app.remarks.as_deref().unwrap_or_default();
    match event {
        ApplicationEvent::Submit => format!("Application {label} was submitted for receiving"),
        ApplicationEvent::Resubmit => format!("Application {label} was resubmitted for receiving"),
        ApplicationEvent::Return => format!("Application {label} was returned: {remarks}"),
        ApplicationEvent::Accept => {
            format!("Application {label} was accepted and awaits technical review")
        }
        ApplicationEvent::Endorse => format!(
            "Application {label} was endorsed for {}",
            app.current_stage.as_str().replace('_', " ")
        ),
        ApplicationEvent::IssueOop => {
            format!("An order of payment for application {label} awaits your signature")
        }
        ApplicationEvent::ConfirmPayment => {
            format!("Payment for application {label} was confirmed")
        }
        ApplicationEvent::GenerateCertificate => {
            format!("The certificate for application {label} awaits signature")
        }
        ApplicationEvent::SignCertificate => {
            format!("The certificate for application {label} is signed and ready for release")
        }
        ApplicationEvent::Release => format!("The permit for application {label} was released"),
        ApplicationEvent::Reject => format!("Application {label} was rejected: {remarks}"),
        ApplicationEvent::Withdraw => format!("Application {label} was withdrawn"),
    }
}

/// Who has to hear about `event` once it has been applied to `app`.
///
/// The desk that now holds the application, or the owner when nobody at
/// the office does. Orders of payment go to both signatories, and the
/// owner is also told about confirmed payments and signed certificates.
fn recipients_for(event: ApplicationEvent, app: &Application) -> Vec<Recipient> {
    match event {
        ApplicationEvent::IssueOop => vec![
            Recipient::Role(Role::ChiefRps),
            Recipient::Role(Role::PenrOfficer),
        ],
        ApplicationEvent::Withdraw if app.submitted_at.is_some() => {
            vec![Recipient::Role(Role::Clerk)]
        }
        _ => {
            let mut recipients = vec![
                app.current_stage
                    .responsible_role()
                    .map_or_else(|| Recipient::user(app.owner.clone()), Recipient::Role),
            ];
            if matches!(
                event,
                ApplicationEvent::ConfirmPayment | ApplicationEvent::SignCertificate
            ) {
                recipients.push(Recipient::user(app.owner.clone()));
            }
            recipients
        }
    }
}

impl Workflow {
    /// Store a notification unless it would go back to `actor` themselves.
    /// Failures are logged; the change that caused them already happened.
    pub(crate) async fn notify(&self, actor: &str, mut notification: Notification) {
        if matches!(notification.recipient, Recipient::User(ref user) if user == actor) {
            return;
        }
        debug!(recipient = ?notification.recipient, kind = ?notification.kind, "notifying");
        if let Err(e) = self.insert(&mut notification).await {
            warn!(error = %e, "failed to store notification");
        }
    }

    /// Tell whoever acts next that `event` happened to `app`.
    pub(crate) async fn notify_transition(
        &self,
        caller: &Caller,
        app: &Application,
        event: ApplicationEvent,
    ) {
        let now = Utc::now();
        let message = message_for(event, app);
        for recipient in recipients_for(event, app) {
            let notification = Notification::new(
                recipient,
                kind_for(event),
                Some(app.id.clone()),
                message.clone(),
                now,
            )
            .with_metadata(json!({
                "event": event,
                "status": app.status,
                "stage": app.current_stage,
                "custom_id": app.custom_id,
                "actor": caller.id,
            }));
            self.notify(&caller.id, notification).await;
        }
    }

    /// Notifications addressed to the caller or the caller's role, newest
    /// first.
    pub async fn list_notifications(
        &self,
        caller: &Caller,
        unread_only: bool,
    ) -> Result<Vec<Notification>, WorkflowError> {
        let mut notifications: Vec<Notification> = self
            .scan::<Notification>()
            .await?
            .into_iter()
            .filter(|n| n.recipient.includes(caller))
            .filter(|n| !unread_only || !n.read)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    pub async fn unread_count(&self, caller: &Caller) -> Result<usize, WorkflowError> {
        Ok(self.list_notifications(caller, true).await?.len())
    }

    /// Mark one notification read. Role-addressed notifications are shared,
    /// so reading one reads it for the whole role.
    pub async fn mark_read(
        &self,
        caller: &Caller,
        id: &NotificationId,
    ) -> Result<Notification, WorkflowError> {
        let (notification, ()) = self
            .modify::<Notification, _, _>(id, |n| {
                if !n.recipient.includes(caller) {
                    return Err(WorkflowError::NotFound(format!("notification {id}")));
                }
                if !n.read {
                    n.read = true;
                    n.read_at = Some(Utc::now());
                }
                Ok(())
            })
            .await?;
        Ok(notification)
    }

    /// Mark everything addressed to the caller read. Returns how many changed.
    pub async fn mark_all_read(&self, caller: &Caller) -> Result<usize, WorkflowError> {
        let unread = self.list_notifications(caller, true).await?;
        let mut marked = 0;
        for notification in unread {
            match self.mark_read(caller, &notification.id).await {
                Ok(_) => marked += 1,
                // Deleted in the meantime.
                Err(WorkflowError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use permittree_core::{ApplicationEvent, NotificationKind, Role};

    use crate::testing::{Harness, complete_csaw};

    use super::*;

    #[tokio::test]
    async fn submission_notifies_the_clerk_inbox() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();

        let clerk = h.personnel(Role::Clerk);
        let inbox = h.workflow.list_notifications(&clerk, false).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::ApplicationSubmitted);
        assert_eq!(inbox[0].recipient, Recipient::Role(Role::Clerk));
        assert!(inbox[0].message.contains("CSAW-"));

        // The applicant did the submitting and hears nothing about it.
        assert!(h.workflow.list_notifications(&h.owner, false).await.unwrap().is_empty());
        let technical = h.personnel(Role::TechnicalStaff);
        assert!(h.workflow.list_notifications(&technical, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn returns_reach_the_owner_with_remarks() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();
        h.workflow
            .transition(
                &h.personnel(Role::Clerk),
                &app.id,
                ApplicationEvent::Return,
                Some("missing notarized affidavit"),
            )
            .await
            .unwrap();

        let inbox = h.workflow.list_notifications(&h.owner, true).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::ApplicationReturned);
        assert!(inbox[0].message.ends_with("missing notarized affidavit"));
        assert_eq!(inbox[0].application_id.as_ref(), Some(&app.id));
    }

    #[tokio::test]
    async fn mark_read_and_unread_count() {
        let h = Harness::new();
        for _ in 0..3 {
            let app = complete_csaw(&h).await;
            h.workflow.submit(&h.owner, &app.id).await.unwrap();
        }

        let clerk = h.personnel(Role::Clerk);
        assert_eq!(h.workflow.unread_count(&clerk).await.unwrap(), 3);

        let first = h.workflow.list_notifications(&clerk, true).await.unwrap()[0].clone();
        let read = h.workflow.mark_read(&clerk, &first.id).await.unwrap();
        assert!(read.read);
        assert!(read.read_at.is_some());
        assert_eq!(h.workflow.unread_count(&clerk).await.unwrap(), 2);

        assert_eq!(h.workflow.mark_all_read(&clerk).await.unwrap(), 2);
        assert_eq!(h.workflow.unread_count(&clerk).await.unwrap(), 0);
        assert_eq!(h.workflow.list_notifications(&clerk, false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn others_cannot_read_foreign_notifications() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();

        let clerk = h.personnel(Role::Clerk);
        let id = h.workflow.list_notifications(&clerk, false).await.unwrap()[0]
            .id
            .clone();
        let err = h.workflow.mark_read(&h.owner, &id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
