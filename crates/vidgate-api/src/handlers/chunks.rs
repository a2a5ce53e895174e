//! Resumable chunk transport handlers.
//!
//! The chunk body is raw bytes; the claimed offset rides in the
//! `Upload-Offset` header, per the resumable-upload convention. A client
//! that lost connectivity queries the offset endpoint and resumes exactly
//! there.

use crate::auth::RequesterContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use vidgate_core::AppError;

const UPLOAD_OFFSET_HEADER: &str = "Upload-Offset";

/// Response after accepting a chunk (or querying progress).
#[derive(Debug, Serialize, ToSchema)]
pub struct OffsetResponse {
    /// Bytes the server has accepted so far
    pub bytes_confirmed: u64,
}

fn claimed_offset(headers: &HeaderMap) -> Result<u64, AppError> {
    headers
        .get(UPLOAD_OFFSET_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Missing or malformed {} header",
                UPLOAD_OFFSET_HEADER
            ))
        })
}

/// Upload one chunk at the confirmed offset
#[utoipa::path(
    patch,
    path = "/api/v0/uploads/sessions/{session_id}/chunks",
    tag = "uploads",
    request_body(content = Vec<u8>, description = "Raw chunk bytes", content_type = "application/octet-stream"),
    params(
        ("session_id" = Uuid, Path, description = "Upload session ID"),
        ("Upload-Offset" = u64, Header, description = "Byte offset of this chunk; must equal bytes_confirmed")
    ),
    responses(
        (status = 200, description = "Chunk accepted", body = OffsetResponse),
        (status = 409, description = "Offset does not match bytes_confirmed", body = ErrorResponse),
        (status = 410, description = "Session passed its deadline", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn upload_chunk(
    requester: RequesterContext,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let offset = claimed_offset(&headers)?;

    let bytes_confirmed = state
        .transport
        .accept_chunk(requester.user_id, session_id, offset, body)
        .await?;

    Ok(Json(OffsetResponse { bytes_confirmed }))
}

/// Query the confirmed offset for resumption
#[utoipa::path(
    get,
    path = "/api/v0/uploads/sessions/{session_id}/offset",
    tag = "uploads",
    params(
        ("session_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Current confirmed offset", body = OffsetResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn current_offset(
    requester: RequesterContext,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let bytes_confirmed = state
        .transport
        .current_offset(requester.user_id, session_id)
        .await?;

    Ok(Json(OffsetResponse { bytes_confirmed }))
}
