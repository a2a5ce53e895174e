//! Route configuration and setup.

use crate::auth::auth_middleware;
use crate::handlers::{chunks, confirm, playback, sessions};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use vidgate_core::Config;

/// Setup all application routes
pub fn build_router(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    // Chunk bodies dominate request size; allow one chunk plus header slack.
    let body_limit = (config.upload.default_chunk_size_bytes + 1024 * 1024) as usize;

    let protected_routes = Router::new()
        .route(
            "/api/v0/uploads/sessions",
            post(sessions::create_upload_session),
        )
        .route(
            "/api/v0/uploads/sessions/{session_id}",
            delete(sessions::cleanup_session),
        )
        .route(
            "/api/v0/uploads/sessions/{session_id}/chunks",
            patch(chunks::upload_chunk),
        )
        .route(
            "/api/v0/uploads/sessions/{session_id}/offset",
            get(chunks::current_offset),
        )
        .route(
            "/api/v0/uploads/sessions/{session_id}/confirm",
            post(confirm::confirm_upload),
        )
        .route(
            "/api/v0/videos/{submission_id}/playback",
            get(playback::issue_playback_grant),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/v0/openapi.json", get(openapi_spec));

    let router = public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    Ok(router)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.server.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins = config
            .server
            .cors_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };
    Ok(cors)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn openapi_spec() -> impl IntoResponse {
    use utoipa::OpenApi;
    Json(crate::api_doc::ApiDoc::openapi())
}
