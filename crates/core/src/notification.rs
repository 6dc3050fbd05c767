use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::caller::Caller;
use crate::role::Role;
use crate::types::{ApplicationId, NotificationId};

/// Who a notification is addressed to: one account, or every holder of a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    User(String),
    Role(Role),
}

impl Recipient {
    pub fn user(username: impl Into<String>) -> Self {
        Self::User(username.into())
    }

    /// Whether `caller` should see notifications sent to this recipient.
    pub fn includes(&self, caller: &Caller) -> bool {
        match self {
            Self::User(username) => caller.is(username),
            Self::Role(role) => caller.role == *role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationSubmitted,
    ApplicationReturned,
    ApplicationAccepted,
    ApplicationEndorsed,
    ApplicationRejected,
    ApplicationWithdrawn,
    OrderOfPaymentIssued,
    OrderOfPaymentSigned,
    PaymentProofSubmitted,
    PaymentProofRejected,
    PaymentProofApproved,
    PaymentConfirmed,
    CertificateGenerated,
    CertificateSigned,
    PermitReleased,
    PaymentReminder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: Recipient,
    pub kind: NotificationKind,
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: Recipient,
        kind: NotificationKind,
        application_id: Option<ApplicationId>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            recipient,
            kind,
            application_id,
            message: message.into(),
            read: false,
            read_at: None,
            metadata: serde_json::Value::Null,
            created_at: now,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_wire_format() {
        let json = serde_json::to_value(Recipient::user("juan")).unwrap();
        assert_eq!(json, serde_json::json!({ "user": "juan" }));
        let json = serde_json::to_value(Recipient::Role(Role::Accountant)).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "accountant" }));
    }

    #[test]
    fn recipient_matching() {
        let clerk = Caller::new("maria", Role::Clerk);
        assert!(Recipient::Role(Role::Clerk).includes(&clerk));
        assert!(Recipient::user("maria").includes(&clerk));
        assert!(!Recipient::user("juan").includes(&clerk));
        assert!(!Recipient::Role(Role::Accountant).includes(&clerk));
    }
}
