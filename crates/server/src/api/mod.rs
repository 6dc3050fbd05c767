pub mod admin;
pub mod auth;
pub mod certificates;
pub mod files;
pub mod health;
pub mod notifications;
pub mod openapi;
pub mod payments;
pub mod permits;
pub mod schemas;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use permittree_audit::AuditStore;
use permittree_workflow::Workflow;

use crate::auth::AuthProvider;
use crate::auth::middleware::AuthLayer;

use self::openapi::ApiDoc;

/// Room for JSON framing around a base64 upload.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The permit engine.
    pub workflow: Arc<Workflow>,
    /// Audit store for the admin trail query (None when audit is disabled).
    pub audit: Option<Arc<dyn AuditStore>>,
    /// Optional auth provider (None when auth is disabled).
    pub auth: Option<Arc<AuthProvider>>,
}

impl AppState {
    /// Request body limit: the largest upload after base64 expansion.
    fn body_limit(&self) -> usize {
        let max_file = usize::try_from(self.workflow.config().max_file_bytes).unwrap_or(usize::MAX);
        max_file
            .saturating_mul(4)
            .div_ceil(3)
            .saturating_add(BODY_OVERHEAD_BYTES)
    }
}

/// Build the Axum router with all API routes, middleware, and Swagger UI.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected = Router::new()
        // Session
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Applications
        .route(
            "/api/permits",
            get(permits::list_applications).post(permits::create_application),
        )
        .route(
            "/api/permits/{id}",
            get(permits::get_application)
                .put(permits::update_application)
                .delete(permits::delete_application),
        )
        .route(
            "/api/permits/{id}/files/{key}",
            put(files::upload_file)
                .get(files::download_file)
                .delete(files::remove_file),
        )
        .route("/api/permits/{id}/submit", post(permits::submit))
        .route("/api/permits/{id}/transition", post(permits::transition))
        .route("/api/permits/{id}/history", get(permits::history))
        .route("/api/dashboard", get(permits::dashboard))
        // Orders of payment
        .route("/api/permits/{id}/oop", post(payments::issue_order_of_payment))
        .route("/api/oops", get(payments::list_orders_of_payment))
        .route("/api/oops/{id}", get(payments::get_order_of_payment))
        .route("/api/oops/{id}/sign", post(payments::sign_order_of_payment))
        .route(
            "/api/oops/{id}/payment-proof",
            post(payments::submit_payment_proof),
        )
        .route(
            "/api/oops/{id}/payment-proof/review",
            post(payments::review_payment_proof),
        )
        .route("/api/oops/{id}/receipt", post(payments::issue_official_receipt))
        // Certificates
        .route(
            "/api/permits/{id}/certificate",
            get(certificates::get_certificate).post(certificates::generate_certificate),
        )
        .route(
            "/api/permits/{id}/certificate/sign",
            post(certificates::sign_certificate),
        )
        .route(
            "/api/permits/{id}/certificate/document",
            get(certificates::render_certificate),
        )
        .route("/api/permits/{id}/release", post(certificates::release))
        // Notifications
        .route("/api/notifications", get(notifications::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/api/notifications/read-all",
            post(notifications::mark_all_read),
        )
        .route(
            "/api/notifications/{id}/read",
            post(notifications::mark_read),
        )
        // Admin
        .route(
            "/api/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route(
            "/api/admin/users/{username}",
            axum::routing::delete(admin::delete_user),
        )
        .route("/api/admin/users/{username}/role", put(admin::set_role))
        .route("/api/admin/audit", get(admin::query_audit))
        .layer(AuthLayer::new(state.auth.clone()));

    let body_limit = state.body_limit();

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
