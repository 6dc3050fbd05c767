pub mod application;
pub mod caller;
pub mod certificate;
pub mod error;
pub mod notification;
pub mod payment;
pub mod permit;
pub mod role;
pub mod state_machine;
pub mod types;

pub use application::{Applicant, Application, FileRef};
pub use caller::Caller;
pub use certificate::{Certificate, CertificateData};
pub use error::TransitionError;
pub use notification::{Notification, NotificationKind, Recipient};
pub use payment::{
    BillItem, OfficialReceipt, OopSignatures, OrderOfPayment, PaymentMethod, PaymentProof,
    Signature, format_pesos, total_centavos,
};
pub use permit::{
    ChainsawDetails, CovDetails, PermitDetails, PermitType, PlantationDetails, TimberDetails,
    TreeCuttingDetails,
};
pub use role::Role;
pub use state_machine::{
    Actor, ApplicationEvent, ApplicationStatus, ApplicationTransition, CertificateEvent,
    CertificateStatus, OopEvent, OopStatus, OopTransition, Stage,
};
pub use types::{ApplicationId, BlobId, CertificateId, NotificationId, OopId};
