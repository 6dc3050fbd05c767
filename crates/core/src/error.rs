use thiserror::Error;

use crate::state_machine::{
    ApplicationEvent, ApplicationStatus, CertificateEvent, CertificateStatus, OopEvent, OopStatus,
    Stage,
};

/// A document was asked to make a move its state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {event} an application that is {status} at the {stage} stage")]
    Application {
        status: ApplicationStatus,
        stage: Stage,
        event: ApplicationEvent,
    },

    #[error("cannot {event} an order of payment that is {status}")]
    OrderOfPayment { status: OopStatus, event: OopEvent },

    #[error("cannot {event} a certificate that is {status}")]
    Certificate {
        status: CertificateStatus,
        event: CertificateEvent,
    },
}

impl TransitionError {
    /// The status the document was in, as its wire string.
    pub fn from_status(&self) -> &'static str {
        match self {
            Self::Application { status, .. } => status.as_str(),
            Self::OrderOfPayment { status, .. } => status.as_str(),
            Self::Certificate { status, .. } => status.as_str(),
        }
    }

    /// The rejected event name.
    pub fn event(&self) -> &'static str {
        match self {
            Self::Application { event, .. } => event.as_str(),
            Self::OrderOfPayment { event, .. } => event.as_str(),
            Self::Certificate { event, .. } => event.as_str(),
        }
    }
}
