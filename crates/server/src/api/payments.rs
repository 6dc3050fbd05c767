//! Order-of-payment endpoints.
//!
//! Issuing and signing are personnel actions; proof submission belongs to
//! the applicant. The workflow decides which role may sign which line.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use permittree_core::{ApplicationId, OopId, OrderOfPayment};
use permittree_workflow::{OopFilter, ProofSubmission};

use crate::auth::identity::CallerIdentity;
use crate::auth::role::Permission;
use crate::error::ServerError;

use super::AppState;
use super::files::decode_upload;
use super::schemas::{
    ErrorResponse, IssueOopRequest, PaymentProofRequest, ReceiptRequest, ReviewProofRequest,
};

/// `POST /api/permits/{id}/oop` -- bill an application.
#[utoipa::path(
    post,
    path = "/api/permits/{id}/oop",
    tag = "Payments",
    summary = "Issue order of payment",
    description = "Bills the application from the fee schedule unless items are given.",
    params(("id" = String, Path, description = "Application ID")),
    request_body(content = IssueOopRequest, description = "Optional bill items"),
    responses(
        (status = 201, description = "Order created", body = OrderOfPayment),
        (status = 400, description = "Application is not at accounting", body = ErrorResponse),
        (status = 403, description = "Caller may not bill", body = ErrorResponse)
    )
)]
pub async fn issue_order_of_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
    body: Option<Json<IssueOopRequest>>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Process)?;
    let Json(body) = body.unwrap_or_default();
    let oop = state
        .workflow
        .issue_order_of_payment(
            &identity.to_caller(),
            &ApplicationId::new(id),
            body.bill_items,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(oop)))
}

/// `GET /api/oops` -- list orders of payment.
#[utoipa::path(
    get,
    path = "/api/oops",
    tag = "Payments",
    summary = "List orders of payment",
    description = "Applicants see their own orders; personnel see all of them.",
    params(OopFilter),
    responses(
        (status = 200, description = "Matching orders", body = Vec<OrderOfPayment>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_orders_of_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Query(filter): Query<OopFilter>,
) -> Result<impl IntoResponse, ServerError> {
    let oops = state
        .workflow
        .list_orders_of_payment(&identity.to_caller(), &filter)
        .await?;
    Ok(Json(oops))
}

/// `GET /api/oops/{id}`
#[utoipa::path(
    get,
    path = "/api/oops/{id}",
    tag = "Payments",
    summary = "Get order of payment",
    params(("id" = String, Path, description = "Order of payment ID")),
    responses(
        (status = 200, description = "The order", body = OrderOfPayment),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn get_order_of_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let oop = state
        .workflow
        .get_order_of_payment(&identity.to_caller(), &OopId::new(id))
        .await?;
    Ok(Json(oop))
}

/// `POST /api/oops/{id}/sign`
#[utoipa::path(
    post,
    path = "/api/oops/{id}/sign",
    tag = "Payments",
    summary = "Sign order of payment",
    description = "Adds the caller's signature. Payable once both signatures are present.",
    params(("id" = String, Path, description = "Order of payment ID")),
    responses(
        (status = 200, description = "Signed order", body = OrderOfPayment),
        (
            status = 400,
            description = "Already signed or not awaiting signature",
            body = ErrorResponse
        ),
        (status = 403, description = "Role does not sign orders", body = ErrorResponse)
    )
)]
pub async fn sign_order_of_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Process)?;
    let oop = state
        .workflow
        .sign_order_of_payment(&identity.to_caller(), &OopId::new(id))
        .await?;
    Ok(Json(oop))
}

/// `POST /api/oops/{id}/payment-proof`
#[utoipa::path(
    post,
    path = "/api/oops/{id}/payment-proof",
    tag = "Payments",
    summary = "Submit payment proof",
    description = "Records the payment reference and optional scan for review.",
    params(("id" = String, Path, description = "Order of payment ID")),
    request_body(
        content = PaymentProofRequest,
        description = "Payment method, reference and amount"
    ),
    responses(
        (status = 200, description = "Updated order", body = OrderOfPayment),
        (status = 400, description = "Order is not awaiting payment", body = ErrorResponse),
        (status = 403, description = "Caller is not the applicant", body = ErrorResponse)
    )
)]
pub async fn submit_payment_proof(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
    Json(body): Json<PaymentProofRequest>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Apply)?;
    let file = body.file.map(decode_upload).transpose()?;
    let oop = state
        .workflow
        .submit_payment_proof(
            &identity.to_caller(),
            &OopId::new(id),
            ProofSubmission {
                method: body.method,
                reference_number: body.reference_number,
                amount_centavos: body.amount_centavos,
                file,
            },
        )
        .await?;
    Ok(Json(oop))
}

/// `POST /api/oops/{id}/payment-proof/review`
#[utoipa::path(
    post,
    path = "/api/oops/{id}/payment-proof/review",
    tag = "Payments",
    summary = "Review payment proof",
    description = "Approves or rejects the proof. A rejection moves it to Payment Proof Rejected.",
    params(("id" = String, Path, description = "Order of payment ID")),
    request_body(content = ReviewProofRequest, description = "Decision and remarks"),
    responses(
        (status = 200, description = "Updated order", body = OrderOfPayment),
        (status = 400, description = "No proof awaiting review", body = ErrorResponse)
    )
)]
pub async fn review_payment_proof(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
    Json(body): Json<ReviewProofRequest>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Process)?;
    let oop = state
        .workflow
        .review_payment_proof(
            &identity.to_caller(),
            &OopId::new(id),
            body.approve,
            body.remarks.as_deref(),
        )
        .await?;
    Ok(Json(oop))
}

/// `POST /api/oops/{id}/receipt`
#[utoipa::path(
    post,
    path = "/api/oops/{id}/receipt",
    tag = "Payments",
    summary = "Issue official receipt",
    description = "Completes the order with an OR number and confirms payment.",
    params(("id" = String, Path, description = "Order of payment ID")),
    request_body(content = ReceiptRequest, description = "Official receipt number"),
    responses(
        (status = 200, description = "Completed order", body = OrderOfPayment),
        (status = 400, description = "Proof not approved yet", body = ErrorResponse),
        (status = 409, description = "Receipt number already used", body = ErrorResponse)
    )
)]
pub async fn issue_official_receipt(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
    Json(body): Json<ReceiptRequest>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Process)?;
    let oop = state
        .workflow
        .issue_official_receipt(&identity.to_caller(), &OopId::new(id), &body.or_number)
        .await?;
    Ok(Json(oop))
}
