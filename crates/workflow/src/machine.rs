//! Pure transition functions over the core state tables.
//!
//! These answer "where would this event take the document?" without
//! touching storage. Who may fire the event is checked separately by
//! [`authorize`], so a stale duplicate action is reported as an invalid
//! transition before any permission question is asked.

use permittree_core::state_machine::{application_transition, oop_transition};
use permittree_core::{
    Actor, ApplicationEvent, ApplicationStatus, Caller, CertificateEvent, CertificateStatus,
    OopEvent, OopStatus, Stage, TransitionError,
};

use crate::error::WorkflowError;

/// The `(status, stage)` an application reaches by firing `event`.
pub fn next_application_state(
    status: ApplicationStatus,
    stage: Stage,
    event: ApplicationEvent,
) -> Result<(ApplicationStatus, Stage), TransitionError> {
    application_transition(status, stage, event).map(|t| (t.to_status, t.to_stage))
}

/// The status an order of payment reaches by firing `event`.
///
/// `signatures_complete` describes the signatures *after* the event, so a
/// first signature keeps the order pending.
pub fn next_oop_status(
    status: OopStatus,
    event: OopEvent,
    signatures_complete: bool,
) -> Result<OopStatus, TransitionError> {
    oop_transition(status, event).map(|t| t.resulting_status(status, signatures_complete))
}

pub fn next_certificate_status(
    status: CertificateStatus,
    event: CertificateEvent,
) -> Result<CertificateStatus, TransitionError> {
    status.apply(event)
}

/// Reject `caller` unless `actor` admits them for a document owned by `owner`.
pub(crate) fn authorize(
    actor: &Actor,
    caller: &Caller,
    owner: &str,
    event: &str,
) -> Result<(), WorkflowError> {
    if actor.admits(caller, owner) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(format!(
            "{} may not {event}",
            caller.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use permittree_core::Role;

    use super::*;

    #[test]
    fn application_moves_follow_the_table() {
        assert_eq!(
            next_application_state(
                ApplicationStatus::Draft,
                Stage::Applicant,
                ApplicationEvent::Submit,
            ),
            Ok((ApplicationStatus::Submitted, Stage::Receiving))
        );
        assert_eq!(
            next_application_state(
                ApplicationStatus::Accepted,
                Stage::ChiefReview,
                ApplicationEvent::Endorse
            ),
            Ok((ApplicationStatus::Accepted, Stage::Accounting))
        );
        let err = next_application_state(
            ApplicationStatus::Released,
            Stage::Closed,
            ApplicationEvent::Withdraw,
        )
        .unwrap_err();
        assert_eq!(err.from_status(), "Released");
        assert_eq!(err.event(), "withdraw");
    }

    #[test]
    fn first_signature_keeps_order_pending() {
        assert_eq!(
            next_oop_status(OopStatus::PendingSignature, OopEvent::Sign, false),
            Ok(OopStatus::PendingSignature)
        );
        assert_eq!(
            next_oop_status(OopStatus::PendingSignature, OopEvent::Sign, true),
            Ok(OopStatus::AwaitingPayment)
        );
    }

    #[test]
    fn receipt_requires_approved_proof() {
        for status in [
            OopStatus::PendingSignature,
            OopStatus::AwaitingPayment,
            OopStatus::PaymentProofSubmitted,
            OopStatus::PaymentProofRejected,
            OopStatus::Completed,
        ] {
            assert!(next_oop_status(status, OopEvent::IssueReceipt, true).is_err());
        }
        assert_eq!(
            next_oop_status(OopStatus::PaymentProofApproved, OopEvent::IssueReceipt, true),
            Ok(OopStatus::Completed)
        );
    }

    #[test]
    fn certificate_cannot_skip_signing() {
        assert!(
            next_certificate_status(CertificateStatus::Generated, CertificateEvent::Release)
                .is_err()
        );
        assert_eq!(
            next_certificate_status(CertificateStatus::Generated, CertificateEvent::Sign),
            Ok(CertificateStatus::Signed)
        );
    }

    #[test]
    fn authorize_reports_role() {
        let clerk = Caller::new("maria", Role::Clerk);
        let err = authorize(&Actor::Owner, &clerk, "juan", "submit").unwrap_err();
        assert_eq!(err.to_string(), "forbidden: clerk may not submit");
        assert!(authorize(&Actor::Personnel(&[Role::Clerk]), &clerk, "juan", "accept").is_ok());
    }
}
