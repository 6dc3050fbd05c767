use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;

use crate::auth::identity::CallerIdentity;
use crate::auth::middleware::bearer_token;
use crate::auth::users::UserProfile;
use crate::auth::{AuthProvider, NewUser};
use crate::error::ServerError;

use super::AppState;
use super::schemas::{ErrorResponse, LoginRequest, LoginResponse, RegisterRequest, StatusResponse};

pub(crate) fn provider(state: &AppState) -> Result<&Arc<AuthProvider>, ServerError> {
    state
        .auth
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("authentication is not enabled".into()))
}

/// `POST /api/auth/register` -- create an applicant account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    summary = "Register",
    description = "Create an applicant account. Administrators create personnel accounts.",
    request_body(content = RegisterRequest, description = "New account"),
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid username or password", body = ErrorResponse),
        (status = 403, description = "Registration is closed", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let auth = provider(&state)?;
    let user = auth
        .register(NewUser {
            username: body.username,
            password: body.password,
            role: permittree_core::Role::Applicant,
            full_name: body.full_name,
            email: body.email,
            notify_email: body.notify_email,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

/// `POST /api/auth/login` -- authenticate with username/password and receive a JWT.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Login",
    description = "Authenticate with username and password to receive a JWT token.",
    request_body(content = LoginRequest, description = "Login credentials"),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let auth = provider(&state)?;
    let (token, expires_in, user) = auth.login(&body.username, &body.password).await?;
    Ok(Json(LoginResponse {
        token,
        expires_in,
        user: UserProfile::from(&user),
    }))
}

/// `POST /api/auth/logout` -- revoke the current JWT token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    summary = "Logout",
    description = "Revoke the current JWT token, making it immediately invalid.",
    responses(
        (status = 200, description = "Logged out successfully", body = StatusResponse),
        (status = 401, description = "Invalid or missing token", body = ErrorResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServerError> {
    let auth = provider(&state)?;
    let token = bearer_token(&headers)
        .ok_or_else(|| crate::auth::AuthError::InvalidToken("missing Bearer token".into()))?;
    auth.revoke_jwt(token).await?;
    Ok(Json(StatusResponse::new("logged_out")))
}

/// `GET /api/auth/me` -- the caller's account.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    summary = "Current user",
    description = "The caller's profile; the anonymous administrator when auth is disabled.",
    responses(
        (status = 200, description = "Caller profile", body = UserProfile),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ServerError> {
    let Some(auth) = state.auth.as_ref() else {
        return Ok(Json(UserProfile {
            username: identity.id,
            role: identity.role,
            full_name: String::new(),
            email: None,
            notify_email: false,
            created_at: Utc::now(),
        }));
    };
    let user = auth
        .users()
        .get(&identity.id)
        .await?
        .ok_or_else(|| crate::auth::AuthError::UnknownUser(identity.id.clone()))?;
    Ok(Json(UserProfile::from(&user)))
}
