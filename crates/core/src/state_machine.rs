//! Permit workflow state machines.
//!
//! Applications, orders of payment and certificates each move through an
//! explicit transition table. Anything not listed in a table is rejected
//! with a [`TransitionError`], so a document's status can never be set to
//! an arbitrary value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::caller::Caller;
use crate::error::TransitionError;
use crate::role::Role;

/// The desk that currently holds an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Back with the applicant (draft or returned).
    Applicant,
    Receiving,
    TechnicalReview,
    ChiefReview,
    Accounting,
    Payment,
    Certification,
    Signing,
    Releasing,
    /// No further action (released, rejected, withdrawn).
    Closed,
}

impl Stage {
    pub const ALL: [Self; 10] = [
        Self::Applicant,
        Self::Receiving,
        Self::TechnicalReview,
        Self::ChiefReview,
        Self::Accounting,
        Self::Payment,
        Self::Certification,
        Self::Signing,
        Self::Releasing,
        Self::Closed,
    ];

    /// The personnel role responsible for applications at this stage.
    ///
    /// `None` for the applicant stage (the owner acts) and for closed
    /// applications.
    pub fn responsible_role(self) -> Option<Role> {
        match self {
            Self::Applicant | Self::Closed => None,
            Self::Receiving | Self::Releasing => Some(Role::Clerk),
            Self::TechnicalReview | Self::Certification => Some(Role::TechnicalStaff),
            Self::ChiefReview => Some(Role::ChiefRps),
            Self::Accounting => Some(Role::Accountant),
            Self::Payment => Some(Role::BillCollector),
            Self::Signing => Some(Role::PenrOfficer),
        }
    }

    /// Stages whose queue belongs to `role`. Admins see every open stage.
    pub fn queue_for(role: Role) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|stage| match role {
                Role::Admin => !matches!(stage, Self::Applicant | Self::Closed),
                other => stage.responsible_role() == Some(other),
            })
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Receiving => "receiving",
            Self::TechnicalReview => "technical_review",
            Self::ChiefReview => "chief_review",
            Self::Accounting => "accounting",
            Self::Payment => "payment",
            Self::Certification => "certification",
            Self::Signing => "signing",
            Self::Releasing => "releasing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a permit application.
///
/// Serialized with the human-readable strings shown on dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    Returned,
    Accepted,
    #[serde(rename = "Awaiting Payment")]
    AwaitingPayment,
    #[serde(rename = "Payment Confirmed")]
    PaymentConfirmed,
    #[serde(rename = "For Signature")]
    ForSignature,
    #[serde(rename = "For Release")]
    ForRelease,
    Released,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [Self; 11] = [
        Self::Draft,
        Self::Submitted,
        Self::Returned,
        Self::Accepted,
        Self::AwaitingPayment,
        Self::PaymentConfirmed,
        Self::ForSignature,
        Self::ForRelease,
        Self::Released,
        Self::Rejected,
        Self::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Returned => "Returned",
            Self::Accepted => "Accepted",
            Self::AwaitingPayment => "Awaiting Payment",
            Self::PaymentConfirmed => "Payment Confirmed",
            Self::ForSignature => "For Signature",
            Self::ForRelease => "For Release",
            Self::Released => "Released",
            Self::Rejected => "Rejected",
            Self::Withdrawn => "Withdrawn",
        }
    }

    /// Parse the wire string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Terminal statuses accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Rejected | Self::Withdrawn)
    }

    /// Whether the owner may still edit the form and its uploads.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Returned)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move an application through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEvent {
    Submit,
    Resubmit,
    Return,
    Accept,
    Endorse,
    IssueOop,
    ConfirmPayment,
    GenerateCertificate,
    SignCertificate,
    Release,
    Reject,
    Withdraw,
}

impl ApplicationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Resubmit => "resubmit",
            Self::Return => "return",
            Self::Accept => "accept",
            Self::Endorse => "endorse",
            Self::IssueOop => "issue_oop",
            Self::ConfirmPayment => "confirm_payment",
            Self::GenerateCertificate => "generate_certificate",
            Self::SignCertificate => "sign_certificate",
            Self::Release => "release",
            Self::Reject => "reject",
            Self::Withdraw => "withdraw",
        }
    }

    /// Returning and rejecting must tell the applicant why.
    pub fn requires_remarks(self) -> bool {
        matches!(self, Self::Return | Self::Reject)
    }
}

impl fmt::Display for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may fire a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The applicant who owns the document.
    Owner,
    /// Any of the listed personnel roles. Admins are always admitted.
    Personnel(&'static [Role]),
}

impl Actor {
    /// Check whether `caller` may act on a document owned by `owner`.
    pub fn admits(&self, caller: &Caller, owner: &str) -> bool {
        match self {
            Self::Owner => caller.is(owner),
            Self::Personnel(roles) => caller.is_admin() || roles.contains(&caller.role),
        }
    }
}

/// One row of the application transition table.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationTransition {
    pub event: ApplicationEvent,
    pub from_status: ApplicationStatus,
    pub from_stage: Stage,
    pub to_status: ApplicationStatus,
    pub to_stage: Stage,
    pub actor: Actor,
}

const fn app(
    event: ApplicationEvent,
    from: (ApplicationStatus, Stage),
    to: (ApplicationStatus, Stage),
    actor: Actor,
) -> ApplicationTransition {
    ApplicationTransition {
        event,
        from_status: from.0,
        from_stage: from.1,
        to_status: to.0,
        to_stage: to.1,
        actor,
    }
}

const CLERK: &[Role] = &[Role::Clerk];
const TECHNICAL: &[Role] = &[Role::TechnicalStaff];
const CHIEF: &[Role] = &[Role::ChiefRps];
const ACCOUNTANT: &[Role] = &[Role::Accountant];
const COLLECTOR: &[Role] = &[Role::BillCollector];
const PENR: &[Role] = &[Role::PenrOfficer];
const RECEIVING_REJECTORS: &[Role] = &[Role::Clerk, Role::PenrOfficer];
const REVIEW_REJECTORS: &[Role] = &[Role::ChiefRps, Role::PenrOfficer];
const OOP_SIGNATORIES: &[Role] = &[Role::ChiefRps, Role::PenrOfficer];

/// The complete application transition table.
pub const APPLICATION_TRANSITIONS: &[ApplicationTransition] = {
    use ApplicationEvent as E;
    use ApplicationStatus as S;
    &[
        app(
            E::Submit,
            (S::Draft, Stage::Applicant),
            (S::Submitted, Stage::Receiving),
            Actor::Owner,
        ),
        app(
            E::Resubmit,
            (S::Returned, Stage::Applicant),
            (S::Submitted, Stage::Receiving),
            Actor::Owner,
        ),
        app(
            E::Return,
            (S::Submitted, Stage::Receiving),
            (S::Returned, Stage::Applicant),
            Actor::Personnel(CLERK),
        ),
        app(
            E::Return,
            (S::Accepted, Stage::TechnicalReview),
            (S::Returned, Stage::Applicant),
            Actor::Personnel(TECHNICAL),
        ),
        app(
            E::Accept,
            (S::Submitted, Stage::Receiving),
            (S::Accepted, Stage::TechnicalReview),
            Actor::Personnel(CLERK),
        ),
        app(
            E::Endorse,
            (S::Accepted, Stage::TechnicalReview),
            (S::Accepted, Stage::ChiefReview),
            Actor::Personnel(TECHNICAL),
        ),
        app(
            E::Endorse,
            (S::Accepted, Stage::ChiefReview),
            (S::Accepted, Stage::Accounting),
            Actor::Personnel(CHIEF),
        ),
        app(
            E::IssueOop,
            (S::Accepted, Stage::Accounting),
            (S::AwaitingPayment, Stage::Payment),
            Actor::Personnel(ACCOUNTANT),
        ),
        app(
            E::ConfirmPayment,
            (S::AwaitingPayment, Stage::Payment),
            (S::PaymentConfirmed, Stage::Certification),
            Actor::Personnel(COLLECTOR),
        ),
        app(
            E::GenerateCertificate,
            (S::PaymentConfirmed, Stage::Certification),
            (S::ForSignature, Stage::Signing),
            Actor::Personnel(TECHNICAL),
        ),
        app(
            E::SignCertificate,
            (S::ForSignature, Stage::Signing),
            (S::ForRelease, Stage::Releasing),
            Actor::Personnel(PENR),
        ),
        app(
            E::Release,
            (S::ForRelease, Stage::Releasing),
            (S::Released, Stage::Closed),
            Actor::Personnel(CLERK),
        ),
        app(
            E::Reject,
            (S::Submitted, Stage::Receiving),
            (S::Rejected, Stage::Closed),
            Actor::Personnel(RECEIVING_REJECTORS),
        ),
        app(
            E::Reject,
            (S::Accepted, Stage::TechnicalReview),
            (S::Rejected, Stage::Closed),
            Actor::Personnel(REVIEW_REJECTORS),
        ),
        app(
            E::Reject,
            (S::Accepted, Stage::ChiefReview),
            (S::Rejected, Stage::Closed),
            Actor::Personnel(REVIEW_REJECTORS),
        ),
        app(E::Withdraw, (S::Draft, Stage::Applicant), (S::Withdrawn, Stage::Closed), Actor::Owner),
        app(
            E::Withdraw,
            (S::Submitted, Stage::Receiving),
            (S::Withdrawn, Stage::Closed),
            Actor::Owner,
        ),
        app(
            E::Withdraw,
            (S::Returned, Stage::Applicant),
            (S::Withdrawn, Stage::Closed),
            Actor::Owner,
        ),
    ]
};

/// Look up the transition for `event` from the given position.
pub fn application_transition(
    status: ApplicationStatus,
    stage: Stage,
    event: ApplicationEvent,
) -> Result<&'static ApplicationTransition, TransitionError> {
    APPLICATION_TRANSITIONS
        .iter()
        .find(|t| t.event == event && t.from_status == status && t.from_stage == stage)
        .ok_or(TransitionError::Application {
            status,
            stage,
            event,
        })
}

/// Events `caller` could fire right now on an application owned by `owner`.
pub fn available_events(
    status: ApplicationStatus,
    stage: Stage,
    caller: &Caller,
    owner: &str,
) -> Vec<ApplicationEvent> {
    let mut events: Vec<ApplicationEvent> = APPLICATION_TRANSITIONS
        .iter()
        .filter(|t| t.from_status == status && t.from_stage == stage)
        .filter(|t| t.actor.admits(caller, owner))
        .map(|t| t.event)
        .collect();
    events.dedup();
    events
}

/// Status of an order of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum OopStatus {
    #[serde(rename = "Pending Signature")]
    PendingSignature,
    #[serde(rename = "Awaiting Payment")]
    AwaitingPayment,
    #[serde(rename = "Payment Proof Submitted")]
    PaymentProofSubmitted,
    #[serde(rename = "Payment Proof Rejected")]
    PaymentProofRejected,
    #[serde(rename = "Payment Proof Approved")]
    PaymentProofApproved,
    #[serde(rename = "Completed OOP")]
    Completed,
}

impl OopStatus {
    pub const ALL: [Self; 6] = [
        Self::PendingSignature,
        Self::AwaitingPayment,
        Self::PaymentProofSubmitted,
        Self::PaymentProofRejected,
        Self::PaymentProofApproved,
        Self::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingSignature => "Pending Signature",
            Self::AwaitingPayment => "Awaiting Payment",
            Self::PaymentProofSubmitted => "Payment Proof Submitted",
            Self::PaymentProofRejected => "Payment Proof Rejected",
            Self::PaymentProofApproved => "Payment Proof Approved",
            Self::Completed => "Completed OOP",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Whether the applicant still owes a payment (or a corrected proof).
    pub fn is_unpaid(self) -> bool {
        matches!(self, Self::AwaitingPayment | Self::PaymentProofRejected)
    }
}

impl fmt::Display for OopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events on an order of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum OopEvent {
    Sign,
    SubmitProof,
    RejectProof,
    ApproveProof,
    IssueReceipt,
}

impl OopEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::SubmitProof => "submit_proof",
            Self::RejectProof => "reject_proof",
            Self::ApproveProof => "approve_proof",
            Self::IssueReceipt => "issue_receipt",
        }
    }
}

impl fmt::Display for OopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the order-of-payment transition table.
#[derive(Debug, Clone, Copy)]
pub struct OopTransition {
    pub event: OopEvent,
    pub from: &'static [OopStatus],
    pub to: OopStatus,
    pub actor: Actor,
}

impl OopTransition {
    /// The status after firing this transition.
    ///
    /// Signing only leaves `Pending Signature` once every signatory has signed.
    pub fn resulting_status(&self, current: OopStatus, signatures_complete: bool) -> OopStatus {
        if self.event == OopEvent::Sign && !signatures_complete {
            current
        } else {
            self.to
        }
    }
}

/// The complete order-of-payment transition table.
pub const OOP_TRANSITIONS: &[OopTransition] = {
    use OopStatus as S;
    &[
        OopTransition {
            event: OopEvent::Sign,
            from: &[S::PendingSignature],
            to: S::AwaitingPayment,
            actor: Actor::Personnel(OOP_SIGNATORIES),
        },
        OopTransition {
            event: OopEvent::SubmitProof,
            from: &[S::AwaitingPayment, S::PaymentProofRejected],
            to: S::PaymentProofSubmitted,
            actor: Actor::Owner,
        },
        OopTransition {
            event: OopEvent::RejectProof,
            from: &[S::PaymentProofSubmitted],
            to: S::PaymentProofRejected,
            actor: Actor::Personnel(COLLECTOR),
        },
        OopTransition {
            event: OopEvent::ApproveProof,
            from: &[S::PaymentProofSubmitted],
            to: S::PaymentProofApproved,
            actor: Actor::Personnel(COLLECTOR),
        },
        OopTransition {
            event: OopEvent::IssueReceipt,
            from: &[S::PaymentProofApproved],
            to: S::Completed,
            actor: Actor::Personnel(COLLECTOR),
        },
    ]
};

/// Look up the order-of-payment transition for `event` from `status`.
pub fn oop_transition(
    status: OopStatus,
    event: OopEvent,
) -> Result<&'static OopTransition, TransitionError> {
    OOP_TRANSITIONS
        .iter()
        .find(|t| t.event == event && t.from.contains(&status))
        .ok_or(TransitionError::OrderOfPayment { status, event })
}

/// Status of an issued certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum CertificateStatus {
    Generated,
    Signed,
    Released,
}

impl CertificateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "Generated",
            Self::Signed => "Signed",
            Self::Released => "Released",
        }
    }

    /// Apply `event`: `Generated` → `Signed` → `Released`.
    pub fn apply(self, event: CertificateEvent) -> Result<Self, TransitionError> {
        match (self, event) {
            (Self::Generated, CertificateEvent::Sign) => Ok(Self::Signed),
            (Self::Signed, CertificateEvent::Release) => Ok(Self::Released),
            (status, event) => Err(TransitionError::Certificate { status, event }),
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CertificateEvent {
    Sign,
    Release,
}

impl CertificateEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for CertificateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ApplicationEvent as E;
    use ApplicationStatus as S;

    fn owner() -> Caller {
        Caller::new("juan", Role::Applicant)
    }

    #[test]
    fn happy_path_reaches_release() {
        let steps = [
            E::Submit,
            E::Accept,
            E::Endorse,
            E::Endorse,
            E::IssueOop,
            E::ConfirmPayment,
            E::GenerateCertificate,
            E::SignCertificate,
            E::Release,
        ];
        let (mut status, mut stage) = (S::Draft, Stage::Applicant);
        for event in steps {
            let t = application_transition(status, stage, event).unwrap();
            status = t.to_status;
            stage = t.to_stage;
        }
        assert_eq!(status, S::Released);
        assert_eq!(stage, Stage::Closed);
        assert!(status.is_terminal());
    }

    #[test]
    fn draft_cannot_skip_to_accepted() {
        let err = application_transition(S::Draft, Stage::Applicant, E::Accept).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Application {
                status: S::Draft,
                stage: Stage::Applicant,
                event: E::Accept,
            }
        );
        assert!(err.to_string().contains("Draft"));
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        for status in [S::Released, S::Rejected, S::Withdrawn] {
            for event in [E::Submit, E::Resubmit, E::Withdraw, E::Reject, E::Release] {
                assert!(application_transition(status, Stage::Closed, event).is_err());
            }
        }
    }

    #[test]
    fn returned_application_goes_back_to_receiving() {
        let t = application_transition(S::Submitted, Stage::Receiving, E::Return).unwrap();
        assert_eq!((t.to_status, t.to_stage), (S::Returned, Stage::Applicant));
        let t = application_transition(S::Returned, Stage::Applicant, E::Resubmit).unwrap();
        assert_eq!((t.to_status, t.to_stage), (S::Submitted, Stage::Receiving));
    }

    #[test]
    fn actor_rules() {
        let clerk = Caller::new("clerk", Role::Clerk);
        let admin = Caller::new("root", Role::Admin);
        let stranger = Caller::new("pedro", Role::Applicant);

        let accept = application_transition(S::Submitted, Stage::Receiving, E::Accept).unwrap();
        assert!(accept.actor.admits(&clerk, "juan"));
        assert!(accept.actor.admits(&admin, "juan"));
        assert!(!accept.actor.admits(&owner(), "juan"));

        let submit = application_transition(S::Draft, Stage::Applicant, E::Submit).unwrap();
        assert!(submit.actor.admits(&owner(), "juan"));
        assert!(!submit.actor.admits(&stranger, "juan"));
        assert!(!submit.actor.admits(&admin, "juan"));
    }

    #[test]
    fn available_events_for_clerk_at_receiving() {
        let clerk = Caller::new("clerk", Role::Clerk);
        let events = available_events(S::Submitted, Stage::Receiving, &clerk, "juan");
        assert_eq!(events, vec![E::Return, E::Accept, E::Reject]);

        let events = available_events(S::Submitted, Stage::Receiving, &owner(), "juan");
        assert_eq!(events, vec![E::Withdraw]);
    }

    #[test]
    fn every_open_stage_has_a_responsible_role() {
        for stage in Stage::ALL {
            let expected = !matches!(stage, Stage::Applicant | Stage::Closed);
            assert_eq!(stage.responsible_role().is_some(), expected, "{stage}");
        }
        assert_eq!(
            Stage::queue_for(Role::Clerk),
            vec![Stage::Receiving, Stage::Releasing]
        );
        assert!(Stage::queue_for(Role::Applicant).is_empty());
        assert_eq!(Stage::queue_for(Role::Admin).len(), 8);
    }

    #[test]
    fn status_wire_strings() {
        let json = serde_json::to_string(&S::AwaitingPayment).unwrap();
        assert_eq!(json, "\"Awaiting Payment\"");
        assert_eq!(
            ApplicationStatus::from_str_loose("for release"),
            Some(S::ForRelease)
        );
        let json = serde_json::to_string(&OopStatus::Completed).unwrap();
        assert_eq!(json, "\"Completed OOP\"");
    }

    #[test]
    fn payment_proof_never_skips_to_completed() {
        let t = oop_transition(OopStatus::AwaitingPayment, OopEvent::SubmitProof).unwrap();
        assert_eq!(t.to, OopStatus::PaymentProofSubmitted);

        assert!(oop_transition(OopStatus::AwaitingPayment, OopEvent::IssueReceipt).is_err());
        assert!(oop_transition(OopStatus::PaymentProofSubmitted, OopEvent::IssueReceipt).is_err());
        let t = oop_transition(OopStatus::PaymentProofApproved, OopEvent::IssueReceipt).unwrap();
        assert_eq!(t.to, OopStatus::Completed);
    }

    #[test]
    fn rejected_proof_can_be_resubmitted() {
        let t = oop_transition(OopStatus::PaymentProofRejected, OopEvent::SubmitProof).unwrap();
        assert_eq!(t.to, OopStatus::PaymentProofSubmitted);
        assert!(OopStatus::PaymentProofRejected.is_unpaid());
    }

    #[test]
    fn signing_waits_for_both_signatories() {
        let t = oop_transition(OopStatus::PendingSignature, OopEvent::Sign).unwrap();
        assert_eq!(
            t.resulting_status(OopStatus::PendingSignature, false),
            OopStatus::PendingSignature
        );
        assert_eq!(
            t.resulting_status(OopStatus::PendingSignature, true),
            OopStatus::AwaitingPayment
        );
        assert!(oop_transition(OopStatus::AwaitingPayment, OopEvent::Sign).is_err());
    }

    #[test]
    fn certificate_lifecycle() {
        let signed = CertificateStatus::Generated
            .apply(CertificateEvent::Sign)
            .unwrap();
        assert_eq!(signed, CertificateStatus::Signed);
        assert_eq!(
            signed.apply(CertificateEvent::Release).unwrap(),
            CertificateStatus::Released
        );
        assert!(
            CertificateStatus::Generated
                .apply(CertificateEvent::Release)
                .is_err()
        );
        assert!(
            CertificateStatus::Released
                .apply(CertificateEvent::Sign)
                .is_err()
        );
    }
}
