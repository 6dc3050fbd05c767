use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::schemas::HealthResponse;

/// `GET /health` -- liveness check with a summary of the deployment.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Health check",
    description = "Service status, the office code and which optional subsystems are enabled.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        status: "ok".into(),
        office: state.workflow.office().to_owned(),
        auth_enabled: state.auth.is_some(),
        audit_enabled: state.audit.is_some(),
    };
    (StatusCode::OK, Json(body))
}
