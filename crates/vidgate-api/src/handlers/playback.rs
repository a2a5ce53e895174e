//! Playback grant handler.

use crate::auth::RequesterContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use vidgate_services::PlaybackRequest;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PlaybackParams {
    /// Artifact the caller believes belongs to the submission; checked
    /// against the record.
    pub artifact_id: Uuid,
    /// Optional Content-Disposition override, signed into the URL.
    #[serde(default)]
    pub disposition: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaybackGrantResponse {
    /// Signed URL (CDN backend) or bearer token (hosted backend)
    pub url_or_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue a signed playback grant
#[utoipa::path(
    get,
    path = "/api/v0/videos/{submission_id}/playback",
    tag = "videos",
    params(
        ("submission_id" = Uuid, Path, description = "Submission ID"),
        PlaybackParams
    ),
    responses(
        (status = 200, description = "Signed playback grant", body = PlaybackGrantResponse),
        (status = 403, description = "Access denied", body = ErrorResponse),
        (status = 404, description = "No video for this submission", body = ErrorResponse),
        (status = 429, description = "Hourly grant budget exceeded", body = ErrorResponse),
        (status = 500, description = "Signing not configured or failed", body = ErrorResponse)
    )
)]
pub async fn issue_playback_grant(
    requester: RequesterContext,
    State(state): State<Arc<AppState>>,
    Path(submission_id): Path<Uuid>,
    Query(params): Query<PlaybackParams>,
) -> Result<impl IntoResponse, HttpAppError> {
    let oracle = requester.oracle();
    let grant = state
        .playback
        .issue_playback_grant(
            requester.user_id,
            &oracle,
            &PlaybackRequest {
                submission_id,
                claimed_artifact_id: params.artifact_id,
                disposition: params.disposition,
            },
        )
        .await?;

    Ok(Json(PlaybackGrantResponse {
        url_or_token: grant.url_or_token,
        expires_at: grant.expires_at,
    }))
}
