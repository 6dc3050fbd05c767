#![allow(clippy::needless_for_each)]

use permittree_audit::{AuditPage, AuditQuery, AuditSubject, TransitionRecord};
use permittree_core::{
    Applicant, Application, ApplicationEvent, ApplicationStatus, BillItem, Certificate,
    CertificateData, CertificateStatus, ChainsawDetails, CovDetails, FileRef, Notification,
    NotificationKind, OfficialReceipt, OopSignatures, OopStatus, OrderOfPayment, PaymentMethod,
    PaymentProof, PermitDetails, PermitType, PlantationDetails, Recipient, Role, Signature,
    Stage, TimberDetails, TreeCuttingDetails,
};
use permittree_workflow::{Dashboard, ListFilter, OopFilter};

use crate::auth::users::UserProfile;

use super::schemas::{
    CreateApplicationRequest, CreateUserRequest, ErrorResponse, FileUpload, HealthResponse,
    IssueOopRequest, LoginRequest, LoginResponse, MarkAllReadResponse, PaymentProofRequest,
    ReceiptRequest, RegisterRequest, ReviewProofRequest, SetRoleRequest, StatusResponse,
    TransitionRequest, UnreadCountResponse, UpdateApplicationRequest,
};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "PermitTree API",
        version = "0.1.0",
        description = "HTTP API for PENRO permit applications, payments and certificates.",
        license(name = "MIT")
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Registration, login and sessions"),
        (name = "Permits", description = "Permit applications and their lifecycle"),
        (name = "Files", description = "Supporting documents attached to applications"),
        (
            name = "Payments",
            description = "Orders of payment, payment proofs and official receipts"
        ),
        (
            name = "Certificates",
            description = "Certificate drafting, signing, rendering and release"
        ),
        (name = "Notifications", description = "Per-user and per-role notification inboxes"),
        (name = "Admin", description = "Account administration and audit trail")
    ),
    paths(
        super::health::health,
        super::auth::register,
        super::auth::login,
        super::auth::logout,
        super::auth::me,
        super::permits::create_application,
        super::permits::list_applications,
        super::permits::get_application,
        super::permits::update_application,
        super::permits::delete_application,
        super::permits::submit,
        super::permits::transition,
        super::permits::history,
        super::permits::dashboard,
        super::files::upload_file,
        super::files::download_file,
        super::files::remove_file,
        super::payments::issue_order_of_payment,
        super::payments::list_orders_of_payment,
        super::payments::get_order_of_payment,
        super::payments::sign_order_of_payment,
        super::payments::submit_payment_proof,
        super::payments::review_payment_proof,
        super::payments::issue_official_receipt,
        super::certificates::generate_certificate,
        super::certificates::get_certificate,
        super::certificates::sign_certificate,
        super::certificates::render_certificate,
        super::certificates::release,
        super::notifications::list_notifications,
        super::notifications::unread_count,
        super::notifications::mark_read,
        super::notifications::mark_all_read,
        super::admin::list_users,
        super::admin::create_user,
        super::admin::set_role,
        super::admin::delete_user,
        super::admin::query_audit,
    ),
    components(schemas(
        ErrorResponse, HealthResponse, StatusResponse,
        RegisterRequest, LoginRequest, LoginResponse, UserProfile,
        CreateApplicationRequest, UpdateApplicationRequest, TransitionRequest, FileUpload,
        IssueOopRequest, PaymentProofRequest, ReviewProofRequest, ReceiptRequest,
        UnreadCountResponse, MarkAllReadResponse,
        CreateUserRequest, SetRoleRequest,
        Application, Applicant, FileRef, ApplicationStatus, ApplicationEvent, Stage, Role,
        PermitType, PermitDetails, ChainsawDetails, CovDetails, PlantationDetails,
        TreeCuttingDetails, TimberDetails,
        OrderOfPayment, OopStatus, BillItem, OopSignatures, Signature, PaymentProof,
        PaymentMethod, OfficialReceipt,
        Certificate, CertificateData, CertificateStatus,
        Notification, NotificationKind, Recipient,
        Dashboard, ListFilter, OopFilter,
        TransitionRecord, AuditSubject, AuditQuery, AuditPage,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use utoipa::OpenApi;

    use super::*;

    #[test]
    fn documents_every_route_group() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/auth/login",
            "/api/permits/{id}/transition",
            "/api/permits/{id}/files/{key}",
            "/api/oops/{id}/payment-proof",
            "/api/permits/{id}/certificate/document",
            "/api/notifications/unread-count",
            "/api/admin/audit",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
