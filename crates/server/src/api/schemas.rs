use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use permittree_core::{
    Applicant, ApplicationEvent, BillItem, PaymentMethod, PermitDetails, PermitType, Role,
};

use crate::auth::users::UserProfile;

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    #[schema(example = "application 1f0c… not found")]
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status indicator.
    #[schema(example = "ok")]
    pub status: String,
    /// Office code this deployment serves.
    #[schema(example = "PENRO")]
    pub office: String,
    /// Whether JWT authentication is enforced.
    pub auth_enabled: bool,
    /// Whether transitions are written to an audit store.
    pub audit_enabled: bool,
}

// -- auth ----------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "juan")]
    pub username: String,
    pub password: String,
    #[schema(example = "Juan Dela Cruz")]
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Stored preference for email copies of notifications.
    #[serde(default)]
    pub notify_email: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Token lifetime in seconds.
    #[schema(example = 3600)]
    pub expires_in: u64,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "ok")]
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_owned(),
        }
    }
}

// -- permits -------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateApplicationRequest {
    pub permit_type: PermitType,
    pub applicant: Applicant,
    /// Permit-specific fields. Defaults to an empty form.
    #[serde(default)]
    pub details: Option<PermitDetails>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateApplicationRequest {
    #[serde(default)]
    pub applicant: Option<Applicant>,
    #[serde(default)]
    pub details: Option<PermitDetails>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionRequest {
    pub event: ApplicationEvent,
    /// Required for `return` and `reject`.
    #[serde(default)]
    pub remarks: Option<String>,
}

/// A file sent inline as base64.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FileUpload {
    #[schema(example = "or-cr.pdf")]
    pub filename: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    /// Base64 (standard alphabet) file content.
    pub data: String,
}

// -- payments ------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IssueOopRequest {
    /// Explicit bill items. The configured fee schedule is used when omitted.
    #[serde(default)]
    pub bill_items: Option<Vec<BillItem>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentProofRequest {
    pub method: PaymentMethod,
    #[schema(example = "BDO-2025-000123")]
    pub reference_number: String,
    #[schema(example = 53600)]
    pub amount_centavos: i64,
    /// Optional scan of the deposit slip or receipt.
    #[serde(default)]
    pub file: Option<FileUpload>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewProofRequest {
    pub approve: bool,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReceiptRequest {
    #[schema(example = "8812345")]
    pub or_number: String,
}

// -- notifications -------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationParams {
    /// Only unread notifications.
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub marked: usize,
}

// -- admin ---------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: Role,
}
