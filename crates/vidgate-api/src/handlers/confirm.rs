//! Upload confirmation handler.

use crate::auth::RequesterContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use vidgate_core::models::VideoRecordResponse;

/// Confirm a completed upload
#[utoipa::path(
    post,
    path = "/api/v0/uploads/sessions/{session_id}/confirm",
    tag = "uploads",
    params(
        ("session_id" = Uuid, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Current video record state", body = VideoRecordResponse),
        (status = 400, description = "Upload not complete", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn confirm_upload(
    requester: RequesterContext,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .confirmation
        .confirm_upload(requester.user_id, session_id)
        .await?;

    tracing::info!(
        session_id = %session_id,
        submission_id = %record.submission_id,
        status = %record.status,
        "Confirm handled"
    );

    Ok(Json(VideoRecordResponse::from(&record)))
}
