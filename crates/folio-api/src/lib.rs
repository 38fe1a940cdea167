//! folio-api - HTTP API for folio notes, tags, users, and uploads.
//!
//! The binary in `main.rs` only wires configuration, logging, and the
//! database; everything routable lives here so tests can drive [`app`]
//! directly.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;
pub mod validation;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use uuid::Uuid;

use folio_core::defaults::{UPLOAD_MAX_BYTES, UPLOAD_MAX_FILES};

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

use handlers::{auth as auth_handlers, health, notes, tags, uploads, users};

/// Multipart slack on top of the file payloads (field headers, small text fields).
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(subsystem = "api", component = "rate_limit", "Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the full application router.
pub fn app(state: AppState, config: &ServerConfig) -> Router {
    let body_limit = UPLOAD_MAX_FILES * UPLOAD_MAX_BYTES as usize + BODY_LIMIT_SLACK;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/rate-limit/status", get(health::rate_limit_status))
        // Auth
        .route("/api/auth/register", post(auth_handlers::register))
        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/auth/logout", post(auth_handlers::logout))
        // Users
        .route("/api/user", get(users::get_public_user))
        .route(
            "/api/user/me",
            get(users::get_me)
                .patch(users::update_me)
                .delete(users::delete_me),
        )
        .route("/api/users", get(users::list_users))
        // Notes
        .route("/api/notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/api/notes/:id",
            patch(notes::update_note).delete(notes::delete_note),
        )
        .route("/api/notes/:id/tags", put(notes::set_note_tags))
        // Tags
        .route("/api/tags", get(tags::list_tags))
        // Uploads
        .route(
            "/api/uploads",
            get(uploads::get_upload).post(uploads::upload_images),
        )
        .route("/api/uploads/:id", delete(uploads::delete_upload))
        .nest_service("/storage", ServeDir::new(&config.file_storage_path))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.allowed_origins.clone()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
