//! Fixtures shared by the workflow unit tests.

use std::sync::Arc;

use bytes::Bytes;

use permittree_audit_memory::MemoryAuditStore;
use permittree_blob::{BlobStore, StateBlobStore};
use permittree_core::{
    Applicant, Application, ApplicationEvent, Caller, ChainsawDetails, OrderOfPayment,
    PaymentMethod, PermitDetails, PermitType, Role,
};
use permittree_state::StateStore;
use permittree_state_memory::MemoryStateStore;

use crate::builder::WorkflowBuilder;
use crate::payments::ProofSubmission;
use crate::workflow::{UploadedFile, Workflow};

pub struct Harness {
    pub workflow: Workflow,
    pub state: Arc<dyn StateStore>,
    pub blobs: Arc<dyn BlobStore>,
    /// The applicant who owns the fixtures.
    pub owner: Caller,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state(Arc::new(MemoryStateStore::new()))
    }

    /// Fixtures over a caller-supplied state store.
    pub fn with_state(state: Arc<dyn StateStore>) -> Self {
        let blobs: Arc<dyn BlobStore> = Arc::new(StateBlobStore::new(Arc::clone(&state), "PENRO"));
        let workflow = WorkflowBuilder::new()
            .state(Arc::clone(&state))
            .blobs(Arc::clone(&blobs))
            .audit(Arc::new(MemoryAuditStore::new()))
            .build()
            .unwrap();
        Self {
            workflow,
            state,
            blobs,
            owner: Caller::new("juan", Role::Applicant),
        }
    }

    pub fn personnel(&self, role: Role) -> Caller {
        Caller::new(format!("{role}-1"), role)
    }
}

pub fn applicant() -> Applicant {
    Applicant {
        full_name: "Juan Dela Cruz".into(),
        address: "Brgy. Poblacion, Bayombong, Nueva Vizcaya".into(),
        contact_number: "09171234567".into(),
        email: Some("juan@example.ph".into()),
    }
}

pub fn chainsaw_details() -> PermitDetails {
    PermitDetails::Chainsaw(ChainsawDetails {
        brand: "Stihl".into(),
        model: "MS 382".into(),
        serial_number: "1234-5678".into(),
        engine_displacement_cc: Some(72),
        guide_bar_length_inches: Some(20),
        date_of_acquisition: Some("2025-01-15".into()),
        purpose: "Coconut lumber processing".into(),
    })
}

pub fn pdf(filename: &str, data: Bytes) -> UploadedFile {
    UploadedFile {
        filename: filename.into(),
        content_type: "application/pdf".into(),
        data,
    }
}

/// A CSAW draft with every field filled and every required document uploaded.
pub async fn complete_csaw(h: &Harness) -> Application {
    let mut app = h
        .workflow
        .create_application(
            &h.owner,
            PermitType::Csaw,
            applicant(),
            Some(chainsaw_details()),
        )
        .await
        .unwrap();
    for key in PermitType::Csaw.required_documents() {
        app = h
            .workflow
            .upload_file(
                &h.owner,
                &app.id,
                key,
                pdf(&format!("{key}.pdf"), Bytes::from(format!("%PDF {key}"))),
            )
            .await
            .unwrap();
    }
    app
}

/// An application endorsed all the way to the accountant.
pub async fn at_accounting(h: &Harness) -> Application {
    let app = complete_csaw(h).await;
    h.workflow.submit(&h.owner, &app.id).await.unwrap();
    for (role, event) in [
        (Role::Clerk, ApplicationEvent::Accept),
        (Role::TechnicalStaff, ApplicationEvent::Endorse),
        (Role::ChiefRps, ApplicationEvent::Endorse),
    ] {
        h.workflow
            .transition(&h.personnel(role), &app.id, event, None)
            .await
            .unwrap();
    }
    h.workflow.get_application(&h.owner, &app.id).await.unwrap()
}

/// An order of payment issued with default fees and fully signed.
pub async fn signed_order(h: &Harness) -> (Application, OrderOfPayment) {
    let app = at_accounting(h).await;
    let oop = h
        .workflow
        .issue_order_of_payment(&h.personnel(Role::Accountant), &app.id, None)
        .await
        .unwrap();
    h.workflow
        .sign_order_of_payment(&h.personnel(Role::ChiefRps), &oop.id)
        .await
        .unwrap();
    let oop = h
        .workflow
        .sign_order_of_payment(&h.personnel(Role::PenrOfficer), &oop.id)
        .await
        .unwrap();
    (app, oop)
}

pub fn cash_proof(amount_centavos: i64) -> ProofSubmission {
    ProofSubmission {
        method: PaymentMethod::BankDeposit,
        reference_number: "LBP-000123".into(),
        amount_centavos,
        file: Some(UploadedFile {
            filename: "deposit-slip.png".into(),
            content_type: "image/png".into(),
            data: Bytes::from_static(b"\x89PNG slip"),
        }),
    }
}

/// An application whose payment has been confirmed.
pub async fn paid(h: &Harness) -> (Application, OrderOfPayment) {
    let (app, oop) = signed_order(h).await;
    let collector = h.personnel(Role::BillCollector);
    h.workflow
        .submit_payment_proof(&h.owner, &oop.id, cash_proof(oop.total_centavos))
        .await
        .unwrap();
    h.workflow
        .review_payment_proof(&collector, &oop.id, true, None)
        .await
        .unwrap();
    let oop = h
        .workflow
        .issue_official_receipt(&collector, &oop.id, "OR-7654321")
        .await
        .unwrap();
    let app = h.workflow.get_application(&h.owner, &app.id).await.unwrap();
    (app, oop)
}
