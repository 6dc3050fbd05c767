use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::{Extension, Json};

use permittree_core::{Application, ApplicationId, Certificate};

use crate::auth::identity::CallerIdentity;
use crate::auth::role::Permission;
use crate::error::ServerError;

use super::AppState;
use super::schemas::ErrorResponse;

/// `POST /api/permits/{id}/certificate` -- draft the certificate.
#[utoipa::path(
    post,
    path = "/api/permits/{id}/certificate",
    tag = "Certificates",
    summary = "Generate certificate",
    description = "Drafts the certificate for a paid application and numbers it.",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 201, description = "Draft certificate", body = Certificate),
        (status = 400, description = "Payment not confirmed", body = ErrorResponse),
        (status = 403, description = "Role may not generate certificates", body = ErrorResponse)
    )
)]
pub async fn generate_certificate(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Process)?;
    let cert = state
        .workflow
        .generate_certificate(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok((StatusCode::CREATED, Json(cert)))
}

/// `GET /api/permits/{id}/certificate`
#[utoipa::path(
    get,
    path = "/api/permits/{id}/certificate",
    tag = "Certificates",
    summary = "Get certificate",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "The certificate", body = Certificate),
        (status = 404, description = "No certificate yet", body = ErrorResponse)
    )
)]
pub async fn get_certificate(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let cert = state
        .workflow
        .get_certificate(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Json(cert))
}

/// `POST /api/permits/{id}/certificate/sign`
#[utoipa::path(
    post,
    path = "/api/permits/{id}/certificate/sign",
    tag = "Certificates",
    summary = "Sign certificate",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Signed certificate", body = Certificate),
        (status = 400, description = "Certificate is not a draft", body = ErrorResponse),
        (status = 403, description = "Caller is not the PENR officer", body = ErrorResponse)
    )
)]
pub async fn sign_certificate(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Process)?;
    let cert = state
        .workflow
        .sign_certificate(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Json(cert))
}

/// `GET /api/permits/{id}/certificate/document` -- printable HTML.
#[utoipa::path(
    get,
    path = "/api/permits/{id}/certificate/document",
    tag = "Certificates",
    summary = "Render certificate",
    description = "The certificate as HTML. Unsigned certificates are marked as drafts.",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "HTML document", content_type = "text/html"),
        (status = 404, description = "No certificate yet", body = ErrorResponse)
    )
)]
pub async fn render_certificate(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let html = state
        .workflow
        .render_certificate(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Html(html))
}

/// `POST /api/permits/{id}/release` -- hand the signed certificate over.
#[utoipa::path(
    post,
    path = "/api/permits/{id}/release",
    tag = "Certificates",
    summary = "Release permit",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Released application", body = Application),
        (status = 400, description = "Certificate not signed", body = ErrorResponse)
    )
)]
pub async fn release(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Process)?;
    let app = state
        .workflow
        .release(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Json(app))
}
