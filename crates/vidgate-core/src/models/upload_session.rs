use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::storage_types::BackendKind;

/// How the file travels to the store: one PUT for small files, an
/// offset-tracked resumable sequence for large ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Direct,
    Chunked,
}

impl Display for TransportKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TransportKind::Direct => write!(f, "direct"),
            TransportKind::Chunked => write!(f, "chunked"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(TransportKind::Direct),
            "chunked" => Ok(TransportKind::Chunked),
            other => Err(format!("Unknown transport kind: {}", other)),
        }
    }
}

/// Upload session lifecycle. `created -> uploading -> completed`, with
/// `failed` reachable from `uploading` and `deleted` written by cleanup or
/// the reaper.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Created,
    Uploading,
    Completed,
    Failed,
    Deleted,
}

impl SessionStatus {
    /// Live sessions still accept chunks and are subject to reaping.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Created | SessionStatus::Uploading)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_live()
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SessionStatus::Created => write!(f, "created"),
            SessionStatus::Uploading => write!(f, "uploading"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SessionStatus::Created),
            "uploading" => Ok(SessionStatus::Uploading),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            "deleted" => Ok(SessionStatus::Deleted),
            other => Err(format!("Unknown session status: {}", other)),
        }
    }
}

/// A resumable upload slot. Owned exclusively by the requesting principal
/// until confirmed or reaped; `bytes_confirmed` is mutated only by the
/// transport, and status promotion only by confirmation and the reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: Uuid,
    /// Identity reserved with the remote store before the first byte moves.
    pub artifact_id: Uuid,
    pub owner_id: Uuid,
    pub assignment_id: Uuid,
    pub submission_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub expected_size: u64,
    pub transport: TransportKind,
    pub backend: BackendKind,
    pub remote_upload_endpoint: String,
    pub bytes_confirmed: u64,
    pub status: SessionStatus,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Past this instant the session no longer accepts chunks and becomes
    /// eligible for the stale-upload sweep.
    pub deadline: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn remaining_bytes(&self) -> u64 {
        self.expected_size.saturating_sub(self.bytes_confirmed)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

/// Parameters for requesting an upload slot.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct NewUploadSession {
    pub assignment_id: Uuid,
    pub submission_id: Uuid,
    /// Original filename
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub filename: String,
    /// Content type (MIME type)
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
    /// Total file size in bytes
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub file_size: u64,
    /// A retried create with the same key returns the existing session
    /// instead of reserving a second remote artifact.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_liveness() {
        assert!(SessionStatus::Created.is_live());
        assert!(SessionStatus::Uploading.is_live());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Deleted.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            SessionStatus::Created,
            SessionStatus::Uploading,
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::Deleted,
        ] {
            assert_eq!(status.to_string().parse::<SessionStatus>(), Ok(status));
        }
    }
}
