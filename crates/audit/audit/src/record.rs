use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Which document a transition was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AuditSubject {
    Application,
    OrderOfPayment,
    Certificate,
}

impl AuditSubject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::OrderOfPayment => "order_of_payment",
            Self::Certificate => "certificate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "application" => Some(Self::Application),
            "order_of_payment" => Some(Self::OrderOfPayment),
            "certificate" => Some(Self::Certificate),
            _ => None,
        }
    }
}

impl fmt::Display for AuditSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied state-machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TransitionRecord {
    /// Unique identifier for this record (UUID v4).
    pub id: String,
    pub office: String,
    pub subject: AuditSubject,
    /// Id of the application, order of payment or certificate.
    pub subject_id: String,
    /// The application the subject belongs to.
    pub application_id: String,
    /// Event name, e.g. `accept` or `approve_proof`.
    pub event: String,
    pub from_status: String,
    pub to_status: String,
    /// Application stages; `None` for documents without stages.
    pub from_stage: Option<String>,
    pub to_stage: Option<String>,
    /// Username of the caller.
    pub actor: String,
    pub actor_role: String,
    pub remarks: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl TransitionRecord {
    /// A record with a fresh id, stamped now. Stages and remarks start empty.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        office: impl Into<String>,
        subject: AuditSubject,
        subject_id: impl Into<String>,
        application_id: impl Into<String>,
        event: impl Into<String>,
        from_status: impl Into<String>,
        to_status: impl Into<String>,
        actor: impl Into<String>,
        actor_role: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            office: office.into(),
            subject,
            subject_id: subject_id.into(),
            application_id: application_id.into(),
            event: event.into(),
            from_status: from_status.into(),
            to_status: to_status.into(),
            from_stage: None,
            to_stage: None,
            actor: actor.into(),
            actor_role: actor_role.into(),
            remarks: None,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_stages(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_stage = Some(from.into());
        self.to_stage = Some(to.into());
        self
    }

    #[must_use]
    pub fn with_remarks(mut self, remarks: Option<String>) -> Self {
        self.remarks = remarks;
        self
    }
}

/// Query parameters for searching transition records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema, utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct AuditQuery {
    pub office: Option<String>,
    pub application_id: Option<String>,
    pub subject: Option<AuditSubject>,
    pub event: Option<String>,
    /// Filter by acting username.
    pub actor: Option<String>,
    /// Only records at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only records at or before this time.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of records to return (default 50, max 1000).
    pub limit: Option<u32>,
    /// Number of records to skip for pagination.
    pub offset: Option<u32>,
}

impl AuditQuery {
    /// Return the effective limit, clamped to 1..=1000, defaulting to 50.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 1000)
    }

    /// Return the effective offset, defaulting to 0.
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Reject a time window that ends before it starts.
    pub fn validate(&self) -> Result<(), AuditError> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(AuditError::InvalidQuery(format!(
                "'from' ({from}) is after 'to' ({to})"
            )));
        }
        Ok(())
    }

    /// Whether `record` passes every filter that is set.
    pub fn matches(&self, record: &TransitionRecord) -> bool {
        fn eq(filter: Option<&String>, value: &str) -> bool {
            filter.is_none_or(|f| f == value)
        }
        eq(self.office.as_ref(), &record.office)
            && eq(self.application_id.as_ref(), &record.application_id)
            && self.subject.is_none_or(|s| s == record.subject)
            && eq(self.event.as_ref(), &record.event)
            && eq(self.actor.as_ref(), &record.actor)
            && self.from.is_none_or(|from| record.recorded_at >= from)
            && self.to.is_none_or(|to| record.recorded_at <= to)
    }
}

/// A paginated page of transition records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditPage {
    pub records: Vec<TransitionRecord>,
    /// Total number of records matching the query (before pagination).
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}
