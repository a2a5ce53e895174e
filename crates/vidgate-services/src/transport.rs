//! Resumable chunk transport.
//!
//! Server side of the offset-tracked upload protocol: a chunk is accepted
//! only at exactly the confirmed offset (gaps and overlaps are both
//! rejected), `bytes_confirmed` advances monotonically through a
//! compare-and-set, and reaching `expected_size` completes the session and
//! finalizes the remote artifact. Direct uploads of small files are the
//! single-chunk degenerate case of the same state machine.

use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

use vidgate_core::models::{SessionStatus, UploadSession};
use vidgate_core::{AppError, Config, RetryConfig};
use vidgate_db::SessionRepository;
use vidgate_storage::VideoStore;

use crate::retry::{run_with_retry, RetryPolicy};
use crate::retry_error_to_app;
use crate::time::{Clock, Sleeper};

pub struct ChunkTransport {
    sessions: Arc<dyn SessionRepository>,
    store: Arc<dyn VideoStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryConfig,
}

impl ChunkTransport {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        store: Arc<dyn VideoStore>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            store,
            clock,
            sleeper,
            retry: config.retry.clone(),
        }
    }

    async fn live_session(
        &self,
        requester_id: Uuid,
        session_id: Uuid,
    ) -> Result<UploadSession, AppError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session not found: {}", session_id)))?;

        // Sessions are owned exclusively by the principal that requested the
        // slot.
        if session.owner_id != requester_id {
            return Err(AppError::AccessDenied {
                reason: vidgate_core::DenyReason::Forbidden,
            });
        }

        if !session.status.is_live() {
            return Err(AppError::InvalidInput(format!(
                "Upload session is {} and no longer accepts chunks",
                session.status
            )));
        }
        if session.is_expired(self.clock.now()) {
            return Err(AppError::SessionExpired(format!(
                "Upload session {} passed its deadline",
                session_id
            )));
        }

        Ok(session)
    }

    /// Accept a chunk at `offset` and return the new confirmed offset.
    pub async fn accept_chunk(
        &self,
        requester_id: Uuid,
        session_id: Uuid,
        offset: u64,
        data: Bytes,
    ) -> Result<u64, AppError> {
        if data.is_empty() {
            return Err(AppError::InvalidInput("Empty chunk".to_string()));
        }

        let session = self.live_session(requester_id, session_id).await?;

        if offset != session.bytes_confirmed {
            return Err(AppError::OffsetMismatch {
                expected: session.bytes_confirmed,
                got: offset,
            });
        }

        let new_confirmed = offset + data.len() as u64;
        if new_confirmed > session.expected_size {
            return Err(AppError::InvalidInput(format!(
                "Chunk would confirm {} bytes past the declared size of {}",
                new_confirmed - session.expected_size,
                session.expected_size
            )));
        }

        let policy = RetryPolicy::data(&self.retry);
        run_with_retry(&policy, self.sleeper.as_ref(), "write_chunk", |_| {
            self.store
                .write_chunk(session.artifact_id, offset, data.clone())
        })
        .await
        .map_err(retry_error_to_app)?;

        let complete = new_confirmed == session.expected_size;
        let next_status = if complete {
            SessionStatus::Completed
        } else {
            SessionStatus::Uploading
        };

        let advanced = self
            .sessions
            .advance_offset(session_id, offset, new_confirmed, next_status)
            .await?;
        if !advanced {
            // Another writer advanced the session first; report the offset
            // it should resume from.
            let current = self
                .sessions
                .get(session_id)
                .await?
                .map(|s| s.bytes_confirmed)
                .unwrap_or(0);
            return Err(AppError::OffsetMismatch {
                expected: current,
                got: offset,
            });
        }

        if complete {
            let finalize_policy = RetryPolicy::control(&self.retry);
            run_with_retry(
                &finalize_policy,
                self.sleeper.as_ref(),
                "finalize_upload",
                |_| {
                    self.store
                        .finalize_upload(session.artifact_id, session.expected_size)
                },
            )
            .await
            .map_err(retry_error_to_app)?;

            tracing::info!(
                session_id = %session_id,
                artifact_id = %session.artifact_id,
                total_bytes = new_confirmed,
                "Upload transport complete"
            );
        } else {
            tracing::debug!(
                session_id = %session_id,
                bytes_confirmed = new_confirmed,
                "Chunk accepted"
            );
        }

        Ok(new_confirmed)
    }

    /// Confirmed offset a disconnected client should resume from.
    pub async fn current_offset(
        &self,
        requester_id: Uuid,
        session_id: Uuid,
    ) -> Result<u64, AppError> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Upload session not found: {}", session_id)))?;
        if session.owner_id != requester_id {
            return Err(AppError::AccessDenied {
                reason: vidgate_core::DenyReason::Forbidden,
            });
        }
        Ok(session.bytes_confirmed)
    }
}
