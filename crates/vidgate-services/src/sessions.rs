//! Upload session manager.
//!
//! Creates and tracks upload slots: validates the request against the
//! configured ceiling, enforces the per-user hourly slot budget, picks the
//! transport by size, and reserves a remote artifact identity before the
//! session is handed to the client. Reservation is idempotent per
//! idempotency key and reversible through cleanup and the reaper.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use vidgate_core::models::{
    NewUploadSession, SessionStatus, TransportKind, UploadSession, VideoStatus,
};
use vidgate_core::{AppError, Config, RateLimitConfig, RetryConfig, UploadConfig};
use vidgate_db::{RateLimitRepository, SessionRepository, VideoRecordRepository};
use vidgate_storage::VideoStore;

use crate::retry::{run_with_retry, RetryPolicy};
use crate::retry_error_to_app;
use crate::time::{Clock, Sleeper};

/// Operation name for the upload-slot rate counter.
pub const OP_UPLOAD_SLOT: &str = "upload_slot";

const SECS_PER_HOUR: i64 = 3600;

pub struct UploadSessionService {
    sessions: Arc<dyn SessionRepository>,
    records: Arc<dyn VideoRecordRepository>,
    rate_limits: Arc<dyn RateLimitRepository>,
    store: Arc<dyn VideoStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    upload: UploadConfig,
    rate_limit: RateLimitConfig,
    retry: RetryConfig,
}

impl UploadSessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        records: Arc<dyn VideoRecordRepository>,
        rate_limits: Arc<dyn RateLimitRepository>,
        store: Arc<dyn VideoStore>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            records,
            rate_limits,
            store,
            clock,
            sleeper,
            upload: config.upload.clone(),
            rate_limit: config.rate_limit.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Request an upload slot for a submission.
    pub async fn create_session(
        &self,
        owner_id: Uuid,
        request: NewUploadSession,
    ) -> Result<UploadSession, AppError> {
        request.validate()?;

        let content_type = request.content_type.to_lowercase();
        if !self.upload.allowed_content_types.contains(&content_type) {
            return Err(AppError::InvalidInput(format!(
                "Content type {} is not an accepted video type",
                request.content_type
            )));
        }

        if request.file_size > self.upload.max_file_size_bytes {
            return Err(AppError::QuotaExceeded(format!(
                "File size {} exceeds the maximum of {} bytes",
                request.file_size, self.upload.max_file_size_bytes
            )));
        }

        // A retried create with the same key returns the live session it
        // created before, without burning rate budget or reserving a second
        // remote artifact.
        if let Some(ref key) = request.idempotency_key {
            if let Some(existing) = self
                .sessions
                .find_by_idempotency_key(owner_id, key)
                .await?
            {
                tracing::info!(
                    session_id = %existing.id,
                    owner_id = %owner_id,
                    "Returning existing session for idempotency key"
                );
                return Ok(existing);
            }
        }

        let now = self.clock.now();
        let hour_bucket = now.timestamp().div_euclid(SECS_PER_HOUR);
        let count = self
            .rate_limits
            .increment(owner_id, OP_UPLOAD_SLOT, hour_bucket)
            .await?;
        if count > self.rate_limit.upload_slots_per_hour {
            return Err(AppError::RateLimited {
                operation: OP_UPLOAD_SLOT.to_string(),
                retry_after_secs: (SECS_PER_HOUR - now.timestamp().rem_euclid(SECS_PER_HOUR))
                    as u64,
            });
        }

        let transport = if request.file_size < self.upload.direct_upload_threshold_bytes {
            TransportKind::Direct
        } else {
            TransportKind::Chunked
        };

        let artifact_id = Uuid::new_v4();
        let policy = RetryPolicy::control(&self.retry);
        let reserved = run_with_retry(&policy, self.sleeper.as_ref(), "reserve_upload", |_| {
            self.store.reserve_upload(
                artifact_id,
                &request.filename,
                &content_type,
                request.file_size,
            )
        })
        .await
        .map_err(retry_error_to_app)?;

        let session = UploadSession {
            id: Uuid::new_v4(),
            artifact_id,
            owner_id,
            assignment_id: request.assignment_id,
            submission_id: request.submission_id,
            filename: request.filename,
            content_type,
            expected_size: request.file_size,
            transport,
            backend: self.store.backend_type(),
            remote_upload_endpoint: reserved.upload_endpoint,
            bytes_confirmed: 0,
            status: SessionStatus::Created,
            idempotency_key: request.idempotency_key,
            created_at: now,
            deadline: now + ChronoDuration::seconds(self.upload.session_deadline_secs),
            updated_at: now,
        };
        self.sessions.create(&session).await?;

        tracing::info!(
            session_id = %session.id,
            owner_id = %owner_id,
            submission_id = %session.submission_id,
            transport = %session.transport,
            expected_size = session.expected_size,
            "Created upload session"
        );

        Ok(session)
    }

    /// Suggested chunk count for a session under the configured chunk size.
    pub fn suggested_chunk_count(&self, session: &UploadSession) -> u64 {
        match session.transport {
            TransportKind::Direct => 1,
            TransportKind::Chunked => session
                .expected_size
                .div_ceil(self.upload.default_chunk_size_bytes),
        }
    }

    pub fn default_chunk_size(&self) -> u64 {
        self.upload.default_chunk_size_bytes
    }

    /// Release a session and its reserved remote artifact. Idempotent:
    /// unknown and already-cleaned sessions both succeed, so a dropped
    /// fire-and-forget cancel can be replayed by the reaper.
    pub async fn cleanup_session(
        &self,
        requester_id: Uuid,
        session_id: Uuid,
    ) -> Result<(), AppError> {
        let session = match self.sessions.get(session_id).await? {
            Some(session) => session,
            None => return Ok(()),
        };
        if session.owner_id != requester_id {
            return Err(AppError::AccessDenied {
                reason: vidgate_core::DenyReason::Forbidden,
            });
        }
        if session.status == SessionStatus::Deleted {
            return Ok(());
        }

        let policy = RetryPolicy::control(&self.retry);
        run_with_retry(&policy, self.sleeper.as_ref(), "delete_artifact", |_| {
            self.store.delete_artifact(session.artifact_id)
        })
        .await
        .map_err(retry_error_to_app)?;

        self.sessions
            .update_status(session_id, SessionStatus::Deleted)
            .await?;

        // A record only exists once confirmation ran; if it did, reflect the
        // cancellation.
        let had_record = self
            .records
            .set_status(session.submission_id, VideoStatus::Deleted, None)
            .await?;

        tracing::info!(
            session_id = %session_id,
            artifact_id = %session.artifact_id,
            had_record = had_record,
            "Cleaned up upload session"
        );

        Ok(())
    }
}
