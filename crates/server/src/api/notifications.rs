use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};

use permittree_core::{Notification, NotificationId};

use crate::auth::identity::CallerIdentity;
use crate::error::ServerError;

use super::AppState;
use super::schemas::{ErrorResponse, MarkAllReadResponse, NotificationParams, UnreadCountResponse};

/// `GET /api/notifications` -- the caller's inbox, newest first.
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    summary = "List notifications",
    description = "Notifications addressed to the caller or to the caller's role.",
    params(NotificationParams),
    responses(
        (status = 200, description = "Notifications", body = Vec<Notification>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Query(params): Query<NotificationParams>,
) -> Result<impl IntoResponse, ServerError> {
    let inbox = state
        .workflow
        .list_notifications(&identity.to_caller(), params.unread)
        .await?;
    Ok(Json(inbox))
}

/// `GET /api/notifications/unread-count`
#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "Notifications",
    summary = "Unread count",
    responses(
        (status = 200, description = "Number of unread notifications", body = UnreadCountResponse)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ServerError> {
    let unread = state.workflow.unread_count(&identity.to_caller()).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

/// `POST /api/notifications/{id}/read`
#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    summary = "Mark read",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Updated notification", body = Notification),
        (status = 404, description = "Not in the caller's inbox", body = ErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let notification = state
        .workflow
        .mark_read(&identity.to_caller(), &NotificationId::new(id))
        .await?;
    Ok(Json(notification))
}

/// `POST /api/notifications/read-all`
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "Notifications",
    summary = "Mark all read",
    responses(
        (status = 200, description = "Number of notifications marked", body = MarkAllReadResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ServerError> {
    let marked = state.workflow.mark_all_read(&identity.to_caller()).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}
