//! Application endpoints: CRUD, submission, transitions and history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use permittree_audit::TransitionRecord;
use permittree_core::{Application, ApplicationId};
use permittree_workflow::{Dashboard, ListFilter};

use crate::auth::identity::CallerIdentity;
use crate::auth::role::Permission;
use crate::error::ServerError;

use super::AppState;
use super::schemas::{
    CreateApplicationRequest, ErrorResponse, StatusResponse, TransitionRequest,
    UpdateApplicationRequest,
};

/// `POST /api/permits` -- start a draft application.
#[utoipa::path(
    post,
    path = "/api/permits",
    tag = "Permits",
    summary = "Create application",
    description = "Creates a draft application owned by the caller.",
    request_body(
        content = CreateApplicationRequest,
        description = "Permit type, applicant and optional form fields"
    ),
    responses(
        (status = 201, description = "Draft created", body = Application),
        (status = 400, description = "Details do not match the permit type", body = ErrorResponse),
        (status = 403, description = "Caller is not an applicant", body = ErrorResponse)
    )
)]
pub async fn create_application(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Apply)?;
    let app = state
        .workflow
        .create_application(
            &identity.to_caller(),
            body.permit_type,
            body.applicant,
            body.details,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(app)))
}

/// `GET /api/permits` -- list visible applications.
#[utoipa::path(
    get,
    path = "/api/permits",
    tag = "Permits",
    summary = "List applications",
    description = "Applicants see their own; personnel see every application. Newest first.",
    params(ListFilter),
    responses(
        (status = 200, description = "Matching applications", body = Vec<Application>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_applications(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Query(filter): Query<ListFilter>,
) -> Result<impl IntoResponse, ServerError> {
    let apps = state
        .workflow
        .list_applications(&identity.to_caller(), &filter)
        .await?;
    Ok(Json(apps))
}

/// `GET /api/permits/{id}`
#[utoipa::path(
    get,
    path = "/api/permits/{id}",
    tag = "Permits",
    summary = "Get application",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "The application", body = Application),
        (status = 404, description = "Not found or not visible to the caller", body = ErrorResponse)
    )
)]
pub async fn get_application(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let app = state
        .workflow
        .get_application(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Json(app))
}

/// `PUT /api/permits/{id}` -- edit a draft or returned application.
#[utoipa::path(
    put,
    path = "/api/permits/{id}",
    tag = "Permits",
    summary = "Update application",
    description = "Replaces applicant and/or details. Owner only, while a draft or returned.",
    params(("id" = String, Path, description = "Application ID")),
    request_body(content = UpdateApplicationRequest, description = "Fields to replace"),
    responses(
        (status = 200, description = "Updated application", body = Application),
        (status = 400, description = "Application is not editable", body = ErrorResponse),
        (status = 403, description = "Caller is not the owner", body = ErrorResponse),
        (status = 409, description = "Concurrent modification", body = ErrorResponse)
    )
)]
pub async fn update_application(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
    Json(body): Json<UpdateApplicationRequest>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Apply)?;
    let app = state
        .workflow
        .update_application(
            &identity.to_caller(),
            &ApplicationId::new(id),
            body.applicant,
            body.details,
        )
        .await?;
    Ok(Json(app))
}

/// `DELETE /api/permits/{id}` -- discard a draft and its uploads.
#[utoipa::path(
    delete,
    path = "/api/permits/{id}",
    tag = "Permits",
    summary = "Delete draft",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Draft deleted", body = StatusResponse),
        (status = 400, description = "Application is no longer a draft", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn delete_application(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Apply)?;
    state
        .workflow
        .delete_application(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Json(StatusResponse::new("deleted")))
}

/// `POST /api/permits/{id}/submit` -- validate and submit for review.
#[utoipa::path(
    post,
    path = "/api/permits/{id}/submit",
    tag = "Permits",
    summary = "Submit application",
    description = "Checks requirements, assigns the tracking number and moves to Submitted.",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Submitted application", body = Application),
        (status = 400, description = "Missing fields or documents", body = ErrorResponse)
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::Apply)?;
    let app = state
        .workflow
        .submit(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Json(app))
}

/// `POST /api/permits/{id}/transition` -- apply a lifecycle event.
#[utoipa::path(
    post,
    path = "/api/permits/{id}/transition",
    tag = "Permits",
    summary = "Transition application",
    description = "Applies an event such as `accept` or `return` if status and role allow it.",
    params(("id" = String, Path, description = "Application ID")),
    request_body(content = TransitionRequest, description = "Event and remarks"),
    responses(
        (status = 200, description = "Updated application", body = Application),
        (
            status = 400,
            description = "Event not allowed from the current status",
            body = ErrorResponse
        ),
        (status = 403, description = "Role may not apply this event", body = ErrorResponse),
        (status = 409, description = "Concurrent modification", body = ErrorResponse)
    )
)]
pub async fn transition(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let app = state
        .workflow
        .transition(
            &identity.to_caller(),
            &ApplicationId::new(id),
            body.event,
            body.remarks.as_deref(),
        )
        .await?;
    Ok(Json(app))
}

/// `GET /api/permits/{id}/history` -- the application's transition trail.
#[utoipa::path(
    get,
    path = "/api/permits/{id}/history",
    tag = "Permits",
    summary = "Application history",
    params(("id" = String, Path, description = "Application ID")),
    responses(
        (
            status = 200,
            description = "Transition records, oldest first",
            body = Vec<TransitionRecord>
        ),
        (status = 404, description = "Not found", body = ErrorResponse)
    )
)]
pub async fn history(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let records = state
        .workflow
        .history(&identity.to_caller(), &ApplicationId::new(id))
        .await?;
    Ok(Json(records))
}

/// `GET /api/dashboard` -- the caller's work queue.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Permits",
    summary = "Dashboard",
    description = "Applications waiting on the caller's role, plus counts per status.",
    responses(
        (status = 200, description = "Queue and counts", body = Dashboard),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ServerError> {
    let dashboard = state.workflow.dashboard(&identity.to_caller()).await?;
    Ok(Json(dashboard))
}
