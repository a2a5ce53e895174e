//! In-memory repositories for tests and local development.
//!
//! Semantics mirror the Postgres implementations, including the
//! compare-and-set offset advance and the upsert keyed by submission id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;
use vidgate_core::models::{SessionStatus, UploadSession, VideoRecord, VideoStatus};
use vidgate_core::AppError;

use crate::traits::{RateLimitRepository, SessionRepository, VideoRecordRepository};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<Uuid, UploadSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, session: &UploadSession) -> Result<(), AppError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: Uuid,
        key: &str,
    ) -> Result<Option<UploadSession>, AppError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.owner_id == owner_id
                    && s.idempotency_key.as_deref() == Some(key)
                    && s.status.is_live()
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn advance_offset(
        &self,
        id: Uuid,
        from_offset: u64,
        to_offset: u64,
        status: SessionStatus,
    ) -> Result<bool, AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(&id) {
            Some(session) if session.bytes_confirmed == from_offset => {
                session.bytes_confirmed = to_offset;
                session.status = status;
                session.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<(), AppError> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&id) {
            session.status = status;
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_stale(&self, now: DateTime<Utc>) -> Result<Vec<UploadSession>, AppError> {
        let mut stale: Vec<UploadSession> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status.is_live() && s.deadline < now)
            .cloned()
            .collect();
        stale.sort_by_key(|s| s.created_at);
        Ok(stale)
    }
}

#[derive(Default)]
pub struct InMemoryVideoRecordRepository {
    records: Mutex<HashMap<Uuid, VideoRecord>>,
}

impl InMemoryVideoRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records; used by idempotence tests.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VideoRecordRepository for InMemoryVideoRecordRepository {
    async fn upsert_for_submission(&self, record: &VideoRecord) -> Result<VideoRecord, AppError> {
        let mut records = self.records.lock().unwrap();
        let stored = records
            .entry(record.submission_id)
            .and_modify(|existing| {
                existing.artifact_id = record.artifact_id;
                existing.assignment_id = record.assignment_id;
                existing.status = record.status;
                existing.file_size = record.file_size;
                existing.duration = record.duration;
                existing.error_message = record.error_message.clone();
                existing.backend = record.backend;
                existing.updated_at = Utc::now();
                existing.deleted_at = record.deleted_at;
                existing.last_checked_at = record.last_checked_at;
            })
            .or_insert_with(|| record.clone());
        Ok(stored.clone())
    }

    async fn get_by_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Option<VideoRecord>, AppError> {
        Ok(self.records.lock().unwrap().get(&submission_id).cloned())
    }

    async fn set_status(
        &self,
        submission_id: Uuid,
        status: VideoStatus,
        error_message: Option<String>,
    ) -> Result<bool, AppError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&submission_id) {
            Some(record) => {
                record.status = status;
                record.error_message = error_message;
                if status == VideoStatus::Deleted && record.deleted_at.is_none() {
                    record.deleted_at = Some(Utc::now());
                }
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryRateLimitRepository {
    counters: Mutex<HashMap<(Uuid, String, i64), u32>>,
}

impl InMemoryRateLimitRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitRepository for InMemoryRateLimitRepository {
    async fn increment(
        &self,
        user_id: Uuid,
        operation: &str,
        hour_bucket: i64,
    ) -> Result<u32, AppError> {
        let mut counters = self.counters.lock().unwrap();
        let count = counters
            .entry((user_id, operation.to_string(), hour_bucket))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }
}
