//! Account administration and the office-wide audit trail.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use permittree_audit::{AuditError, AuditPage, AuditQuery};

use crate::auth::NewUser;
use crate::auth::identity::CallerIdentity;
use crate::auth::role::Permission;
use crate::auth::users::UserProfile;
use crate::error::ServerError;

use super::AppState;
use super::auth::provider;
use super::schemas::{CreateUserRequest, ErrorResponse, SetRoleRequest, StatusResponse};

/// `GET /api/admin/users`
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    summary = "List accounts",
    responses(
        (status = 200, description = "All accounts", body = Vec<UserProfile>),
        (status = 403, description = "Forbidden", body = ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::UsersManage)?;
    let users = provider(&state)?.users().list().await?;
    let profiles: Vec<UserProfile> = users.iter().map(UserProfile::from).collect();
    Ok(Json(profiles))
}

/// `POST /api/admin/users` -- create an account with any role.
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "Admin",
    summary = "Create account",
    request_body(content = CreateUserRequest, description = "New account"),
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid username or password", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Json(body): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::UsersManage)?;
    let user = provider(&state)?
        .create_user(NewUser {
            username: body.username,
            password: body.password,
            role: body.role,
            full_name: body.full_name,
            email: body.email,
            notify_email: false,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

/// `PUT /api/admin/users/{username}/role`
#[utoipa::path(
    put,
    path = "/api/admin/users/{username}/role",
    tag = "Admin",
    summary = "Change role",
    description = "Takes effect on the account's existing sessions.",
    params(("username" = String, Path, description = "Account username")),
    request_body(content = SetRoleRequest, description = "New role"),
    responses(
        (status = 200, description = "Updated account", body = UserProfile),
        (status = 404, description = "No such account", body = ErrorResponse)
    )
)]
pub async fn set_role(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(username): Path<String>,
    Json(body): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::UsersManage)?;
    if username == identity.id {
        return Err(ServerError::BadRequest(
            "administrators cannot change their own role".into(),
        ));
    }
    let user = provider(&state)?.set_role(&username, body.role).await?;
    Ok(Json(UserProfile::from(&user)))
}

/// `DELETE /api/admin/users/{username}`
#[utoipa::path(
    delete,
    path = "/api/admin/users/{username}",
    tag = "Admin",
    summary = "Delete account",
    params(("username" = String, Path, description = "Account username")),
    responses(
        (status = 200, description = "Account deleted", body = StatusResponse),
        (status = 404, description = "No such account", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::UsersManage)?;
    if username == identity.id {
        return Err(ServerError::BadRequest(
            "administrators cannot delete their own account".into(),
        ));
    }
    provider(&state)?.delete_user(&username).await?;
    Ok(Json(StatusResponse::new("deleted")))
}

/// `GET /api/admin/audit` -- search the transition trail.
#[utoipa::path(
    get,
    path = "/api/admin/audit",
    tag = "Admin",
    summary = "Query audit trail",
    description = "Searches transition records across all applications of this office.",
    params(AuditQuery),
    responses(
        (status = 200, description = "Paginated records", body = AuditPage),
        (status = 400, description = "Inverted time window", body = ErrorResponse),
        (status = 403, description = "Forbidden", body = ErrorResponse),
        (status = 404, description = "Audit is not enabled", body = ErrorResponse)
    )
)]
pub async fn query_audit(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
    Query(mut query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ServerError> {
    identity.require(Permission::AuditRead)?;
    let Some(ref audit) = state.audit else {
        return Err(ServerError::NotFound("audit is not enabled".into()));
    };
    query.office = Some(state.workflow.office().to_owned());
    let page = audit.query(&query).await.map_err(|e| match e {
        AuditError::InvalidQuery(_) => ServerError::BadRequest(e.to_string()),
        other => ServerError::Workflow(other.into()),
    })?;
    Ok(Json(page))
}
