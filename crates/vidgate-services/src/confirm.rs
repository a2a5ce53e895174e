//! Confirmation & reconciliation.
//!
//! The only writer of `VideoRecord.status` besides the reaper. After the
//! transport completes, this polls the backend's processing state on a
//! bounded, increasing schedule and promotes the record accordingly. The
//! upsert is keyed by submission id, which makes a second confirm of the
//! same session return the same record instead of creating a duplicate, and
//! terminal records short-circuit before any backend call.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use vidgate_core::models::{SessionStatus, UploadSession, VideoRecord, VideoStatus};
use vidgate_core::{AppError, Config, ConfirmConfig};
use vidgate_db::{SessionRepository, VideoRecordRepository};
use vidgate_storage::{ProcessingReport, ProcessingState, VideoStore};

use crate::store_error_to_app;
use crate::time::{Clock, Sleeper};

pub struct ConfirmationService {
    sessions: Arc<dyn SessionRepository>,
    records: Arc<dyn VideoRecordRepository>,
    store: Arc<dyn VideoStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    confirm: ConfirmConfig,
}

impl ConfirmationService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        records: Arc<dyn VideoRecordRepository>,
        store: Arc<dyn VideoStore>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            records,
            store,
            clock,
            sleeper,
            confirm: config.confirm.clone(),
        }
    }

    /// Confirm a completed upload session, promoting its video record.
    /// Idempotent: safe to call any number of times.
    pub async fn confirm_upload(
        &self,
        requester_id: Uuid,
        session_id: Uuid,
    ) -> Result<VideoRecord, AppError> {
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

        match session.status {
            SessionStatus::Completed => {}
            SessionStatus::Created | SessionStatus::Uploading => {
                return Err(AppError::InvalidInput(format!(
                    "Upload is not complete: {} of {} bytes confirmed",
                    session.bytes_confirmed, session.expected_size
                )));
            }
            SessionStatus::Failed | SessionStatus::Deleted => {
                return Err(AppError::InvalidInput(format!(
                    "Upload session is {} and cannot be confirmed",
                    session.status
                )));
            }
        }

        let now = self.clock.now();
        if let Some(existing) = self.records.get_by_submission(session.submission_id).await? {
            match existing.status {
                // Terminal: answer from the record, no backend call. This is
                // what keeps repeated confirms free of billing-relevant
                // traffic.
                VideoStatus::Ready | VideoStatus::Error | VideoStatus::Deleted => {
                    return Ok(existing);
                }
                VideoStatus::Pending | VideoStatus::Uploading => {
                    if let Some(checked) = existing.last_checked_at {
                        let gate =
                            checked + ChronoDuration::seconds(self.confirm.recheck_interval_secs);
                        if now < gate {
                            tracing::debug!(
                                submission_id = %session.submission_id,
                                "Re-check gated, returning current record"
                            );
                            return Ok(existing);
                        }
                    }
                }
            }
        }

        let report = self.poll_processing(&session).await?;
        let now = self.clock.now();

        let (status, error_message, deleted_at) = match report.state {
            ProcessingState::Ready => (VideoStatus::Ready, None, None),
            ProcessingState::Processing => (VideoStatus::Uploading, None, None),
            ProcessingState::Missing => (
                VideoStatus::Deleted,
                Some("The storage backend no longer has this artifact".to_string()),
                Some(now),
            ),
        };

        let record = VideoRecord {
            id: Uuid::new_v4(),
            artifact_id: session.artifact_id,
            submission_id: session.submission_id,
            assignment_id: session.assignment_id,
            owner_id: session.owner_id,
            status,
            file_size: match status {
                VideoStatus::Ready => report.file_size.or(Some(session.expected_size)),
                _ => None,
            },
            duration: report.duration,
            error_message,
            backend: session.backend,
            created_at: now,
            updated_at: now,
            deleted_at,
            last_checked_at: Some(now),
        };
        let stored = self.records.upsert_for_submission(&record).await?;

        tracing::info!(
            session_id = %session_id,
            submission_id = %session.submission_id,
            status = %stored.status,
            "Upload confirmed"
        );

        Ok(stored)
    }

    /// Poll the backend until it reports a decision or the schedule runs
    /// out. One immediate poll, then one poll after each configured delay.
    async fn poll_processing(&self, session: &UploadSession) -> Result<ProcessingReport, AppError> {
        let mut report = self
            .store
            .processing_report(session.artifact_id)
            .await
            .map_err(store_error_to_app)?;

        for delay_secs in &self.confirm.poll_delays_secs {
            if report.state != ProcessingState::Processing {
                break;
            }
            self.sleeper.sleep(Duration::from_secs(*delay_secs)).await;
            report = self
                .store
                .processing_report(session.artifact_id)
                .await
                .map_err(store_error_to_app)?;
        }

        Ok(report)
    }
}
