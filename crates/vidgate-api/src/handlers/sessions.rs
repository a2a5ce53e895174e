//! Upload session handlers: request a slot, release it.

use crate::auth::RequesterContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use vidgate_core::models::{NewUploadSession, TransportKind};

/// Response for a newly created (or idempotently returned) upload session.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Upload session ID
    pub session_id: Uuid,
    /// Where the client sends bytes
    pub upload_endpoint: String,
    /// Transport negotiated from the declared size
    pub transport_kind: TransportKind,
    /// Suggested chunk size in bytes (chunked transport)
    pub chunk_size: u64,
    /// Chunk count at the suggested size
    pub chunk_count: u64,
    /// Instant after which the session is reaped
    pub deadline: DateTime<Utc>,
}

/// Request an upload slot
#[utoipa::path(
    post,
    path = "/api/v0/uploads/sessions",
    tag = "uploads",
    request_body = NewUploadSession,
    responses(
        (status = 200, description = "Upload session created", body = CreateSessionResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File exceeds the configured ceiling", body = ErrorResponse),
        (status = 429, description = "Hourly slot budget exceeded", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_upload_session(
    requester: RequesterContext,
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewUploadSession>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session = state
        .sessions
        .create_session(requester.user_id, request)
        .await?;

    Ok(Json(CreateSessionResponse {
        session_id: session.id,
        upload_endpoint: session.remote_upload_endpoint.clone(),
        transport_kind: session.transport,
        chunk_size: state.sessions.default_chunk_size(),
        chunk_count: state.sessions.suggested_chunk_count(&session),
        deadline: session.deadline,
    }))
}

/// Release an upload session
#[utoipa::path(
    delete,
    path = "/api/v0/uploads/sessions/{session_id}",
    tag = "uploads",
    params(
        ("session_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 204, description = "Session released (or was already gone)"),
        (status = 403, description = "Not the session owner", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn cleanup_session(
    requester: RequesterContext,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .sessions
        .cleanup_session(requester.user_id, session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
