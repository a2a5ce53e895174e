use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::storage_types::BackendKind;

/// Video record lifecycle. A strict state machine: `ready` is never
/// followed by `uploading`, and `deleted` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Uploading,
    Ready,
    Error,
    Deleted,
}

impl VideoStatus {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        use VideoStatus::*;
        match (self, next) {
            (_, n) if *self == n => true,
            (Pending, Uploading) | (Pending, Ready) | (Pending, Error) | (Pending, Deleted) => true,
            (Uploading, Ready) | (Uploading, Error) | (Uploading, Deleted) => true,
            (Ready, Error) | (Ready, Deleted) => true,
            (Error, Deleted) => true,
            _ => false,
        }
    }
}

impl Display for VideoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VideoStatus::Pending => write!(f, "pending"),
            VideoStatus::Uploading => write!(f, "uploading"),
            VideoStatus::Ready => write!(f, "ready"),
            VideoStatus::Error => write!(f, "error"),
            VideoStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "uploading" => Ok(VideoStatus::Uploading),
            "ready" => Ok(VideoStatus::Ready),
            "error" => Ok(VideoStatus::Error),
            "deleted" => Ok(VideoStatus::Deleted),
            other => Err(format!("Unknown video status: {}", other)),
        }
    }
}

/// One persisted video per submission. Status is written only by the
/// confirmation service and the reaper; the upload transport never touches
/// this row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub submission_id: Uuid,
    pub assignment_id: Uuid,
    pub owner_id: Uuid,
    pub status: VideoStatus,
    pub file_size: Option<u64>,
    /// Seconds, reported by the backend once processing finishes.
    pub duration: Option<f64>,
    pub error_message: Option<String>,
    pub backend: BackendKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Gates re-polling of the backend to at most once per configured
    /// interval while the record sits in `uploading`.
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// API projection of a video record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VideoRecordResponse {
    pub submission_id: Uuid,
    pub status: VideoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&VideoRecord> for VideoRecordResponse {
    fn from(record: &VideoRecord) -> Self {
        Self {
            submission_id: record.submission_id,
            status: record.status,
            file_size: record.file_size,
            duration: record.duration,
            error_message: record.error_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_never_regresses_to_uploading() {
        assert!(!VideoStatus::Ready.can_transition_to(VideoStatus::Uploading));
        assert!(!VideoStatus::Ready.can_transition_to(VideoStatus::Pending));
        assert!(VideoStatus::Ready.can_transition_to(VideoStatus::Deleted));
    }

    #[test]
    fn uploading_promotes_to_ready() {
        assert!(VideoStatus::Uploading.can_transition_to(VideoStatus::Ready));
        assert!(VideoStatus::Uploading.can_transition_to(VideoStatus::Error));
    }
}
