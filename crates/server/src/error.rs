use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use permittree_workflow::WorkflowError;

use crate::api::schemas::ErrorResponse;
use crate::auth::AuthError;

/// Errors that can occur when running the PermitTree server or serving a
/// request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A workflow operation failed.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Authentication or account management failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The request body or parameters are malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The caller's role does not grant access to the endpoint.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Workflow(e) => match e {
                WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
                WorkflowError::InvalidTransition { .. }
                | WorkflowError::Validation(_)
                | WorkflowError::UnsupportedContentType(_) => StatusCode::BAD_REQUEST,
                WorkflowError::Conflict(_) => StatusCode::CONFLICT,
                WorkflowError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                WorkflowError::State(_)
                | WorkflowError::Blob(_)
                | WorkflowError::Audit(_)
                | WorkflowError::Template(_)
                | WorkflowError::Serialization(_)
                | WorkflowError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials
                | AuthError::InvalidToken(_)
                | AuthError::Revoked => StatusCode::UNAUTHORIZED,
                AuthError::RegistrationClosed => StatusCode::FORBIDDEN,
                AuthError::UserExists(_) => StatusCode::CONFLICT,
                AuthError::UnknownUser(_) => StatusCode::NOT_FOUND,
                AuthError::Invalid(_) => StatusCode::BAD_REQUEST,
                AuthError::Store(_) | AuthError::Hash(_) | AuthError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        let cases = [
            (WorkflowError::NotFound("application x".into()), 404),
            (WorkflowError::Forbidden("no".into()), 403),
            (
                WorkflowError::InvalidTransition {
                    from: "Draft".into(),
                    event: "accept".into(),
                },
                400,
            ),
            (WorkflowError::Validation(vec!["documents.or_cr".into()]), 400),
            (WorkflowError::Conflict("busy".into()), 409),
            (WorkflowError::TooLarge { size: 2, limit: 1 }, 413),
            (WorkflowError::Template("boom".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status().as_u16(), expected);
        }
    }

    #[test]
    fn auth_errors_map_to_http_statuses() {
        assert_eq!(
            ServerError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::from(AuthError::UserExists("juan".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::from(AuthError::RegistrationClosed).status(),
            StatusCode::FORBIDDEN
        );
    }
}
