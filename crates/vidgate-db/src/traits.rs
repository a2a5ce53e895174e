//! Repository traits
//!
//! Business logic works against these seams; the Postgres implementations
//! back production and the in-memory ones back tests. Offset advancement is
//! compare-and-set so that concurrent writers resolve through idempotence
//! instead of row locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vidgate_core::models::{SessionStatus, UploadSession, VideoRecord, VideoStatus};
use vidgate_core::AppError;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &UploadSession) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError>;

    /// Find a live session previously created by `owner_id` under the same
    /// idempotency key.
    async fn find_by_idempotency_key(
        &self,
        owner_id: Uuid,
        key: &str,
    ) -> Result<Option<UploadSession>, AppError>;

    /// Compare-and-set advance of `bytes_confirmed` from `from_offset` to
    /// `to_offset`, also writing `status`. Returns false when another writer
    /// advanced the offset first.
    async fn advance_offset(
        &self,
        id: Uuid,
        from_offset: u64,
        to_offset: u64,
        status: SessionStatus,
    ) -> Result<bool, AppError>;

    async fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<(), AppError>;

    /// Live sessions whose deadline has passed as of `now`; the reaper's
    /// work list.
    async fn list_stale(&self, now: DateTime<Utc>) -> Result<Vec<UploadSession>, AppError>;
}

#[async_trait]
pub trait VideoRecordRepository: Send + Sync {
    /// Insert-or-update keyed by submission id. The upsert is what makes
    /// confirmation idempotent: a second confirm updates the same row
    /// instead of creating a duplicate.
    async fn upsert_for_submission(&self, record: &VideoRecord) -> Result<VideoRecord, AppError>;

    async fn get_by_submission(&self, submission_id: Uuid)
        -> Result<Option<VideoRecord>, AppError>;

    /// Write a status (and optional error message) if a record exists.
    /// Returns false when there is no record for the submission.
    async fn set_status(
        &self,
        submission_id: Uuid,
        status: VideoStatus,
        error_message: Option<String>,
    ) -> Result<bool, AppError>;
}

#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Atomically increment the `(user, operation, hour_bucket)` counter and
    /// return the new count.
    async fn increment(
        &self,
        user_id: Uuid,
        operation: &str,
        hour_bucket: i64,
    ) -> Result<u32, AppError>;
}
