//! Postgres repositories
//!
//! Dynamic SQLx queries (no compile-time DATABASE_URL requirement). Status
//! columns are TEXT and round-trip through the model enums' FromStr/Display.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;
use vidgate_core::models::{SessionStatus, TransportKind, UploadSession, VideoRecord, VideoStatus};
use vidgate_core::{AppError, BackendKind};

use crate::traits::{RateLimitRepository, SessionRepository, VideoRecordRepository};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    artifact_id: Uuid,
    owner_id: Uuid,
    assignment_id: Uuid,
    submission_id: Uuid,
    filename: String,
    content_type: String,
    expected_size: i64,
    transport: String,
    backend: String,
    remote_upload_endpoint: String,
    bytes_confirmed: i64,
    status: String,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    deadline: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for UploadSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(UploadSession {
            id: row.id,
            artifact_id: row.artifact_id,
            owner_id: row.owner_id,
            assignment_id: row.assignment_id,
            submission_id: row.submission_id,
            filename: row.filename,
            content_type: row.content_type,
            expected_size: row.expected_size.max(0) as u64,
            transport: TransportKind::from_str(&row.transport).map_err(AppError::Internal)?,
            backend: BackendKind::from_str(&row.backend).map_err(AppError::Internal)?,
            remote_upload_endpoint: row.remote_upload_endpoint,
            bytes_confirmed: row.bytes_confirmed.max(0) as u64,
            status: SessionStatus::from_str(&row.status).map_err(AppError::Internal)?,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            deadline: row.deadline,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VideoRecordRow {
    id: Uuid,
    artifact_id: Uuid,
    submission_id: Uuid,
    assignment_id: Uuid,
    owner_id: Uuid,
    status: String,
    file_size: Option<i64>,
    duration: Option<f64>,
    error_message: Option<String>,
    backend: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    last_checked_at: Option<DateTime<Utc>>,
}

impl TryFrom<VideoRecordRow> for VideoRecord {
    type Error = AppError;

    fn try_from(row: VideoRecordRow) -> Result<Self, Self::Error> {
        Ok(VideoRecord {
            id: row.id,
            artifact_id: row.artifact_id,
            submission_id: row.submission_id,
            assignment_id: row.assignment_id,
            owner_id: row.owner_id,
            status: VideoStatus::from_str(&row.status).map_err(AppError::Internal)?,
            file_size: row.file_size.map(|s| s.max(0) as u64),
            duration: row.duration,
            error_message: row.error_message,
            backend: BackendKind::from_str(&row.backend).map_err(AppError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
            last_checked_at: row.last_checked_at,
        })
    }
}

/// Repository for upload sessions
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: &UploadSession) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                id, artifact_id, owner_id, assignment_id, submission_id,
                filename, content_type, expected_size, transport, backend,
                remote_upload_endpoint, bytes_confirmed, status,
                idempotency_key, created_at, deadline, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(session.id)
        .bind(session.artifact_id)
        .bind(session.owner_id)
        .bind(session.assignment_id)
        .bind(session.submission_id)
        .bind(&session.filename)
        .bind(&session.content_type)
        .bind(session.expected_size as i64)
        .bind(session.transport.to_string())
        .bind(session.backend.to_string())
        .bind(&session.remote_upload_endpoint)
        .bind(session.bytes_confirmed as i64)
        .bind(session.status.to_string())
        .bind(&session.idempotency_key)
        .bind(session.created_at)
        .bind(session.deadline)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadSession>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, artifact_id, owner_id, assignment_id, submission_id,
                   filename, content_type, expected_size, transport, backend,
                   remote_upload_endpoint, bytes_confirmed, status,
                   idempotency_key, created_at, deadline, updated_at
            FROM upload_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UploadSession::try_from).transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: Uuid,
        key: &str,
    ) -> Result<Option<UploadSession>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, artifact_id, owner_id, assignment_id, submission_id,
                   filename, content_type, expected_size, transport, backend,
                   remote_upload_endpoint, bytes_confirmed, status,
                   idempotency_key, created_at, deadline, updated_at
            FROM upload_sessions
            WHERE owner_id = $1 AND idempotency_key = $2
              AND status IN ('created', 'uploading')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(owner_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UploadSession::try_from).transpose()
    }

    async fn advance_offset(
        &self,
        id: Uuid,
        from_offset: u64,
        to_offset: u64,
        status: SessionStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE upload_sessions
            SET bytes_confirmed = $3, status = $4, updated_at = NOW()
            WHERE id = $1 AND bytes_confirmed = $2
            "#,
        )
        .bind(id)
        .bind(from_offset as i64)
        .bind(to_offset as i64)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE upload_sessions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_stale(&self, now: DateTime<Utc>) -> Result<Vec<UploadSession>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, artifact_id, owner_id, assignment_id, submission_id,
                   filename, content_type, expected_size, transport, backend,
                   remote_upload_endpoint, bytes_confirmed, status,
                   idempotency_key, created_at, deadline, updated_at
            FROM upload_sessions
            WHERE status IN ('created', 'uploading') AND deadline < $1
            ORDER BY created_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UploadSession::try_from).collect()
    }
}

/// Repository for video records
#[derive(Clone)]
pub struct PgVideoRecordRepository {
    pool: PgPool,
}

impl PgVideoRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRecordRepository for PgVideoRecordRepository {
    async fn upsert_for_submission(&self, record: &VideoRecord) -> Result<VideoRecord, AppError> {
        let row = sqlx::query_as::<_, VideoRecordRow>(
            r#"
            INSERT INTO video_records (
                id, artifact_id, submission_id, assignment_id, owner_id,
                status, file_size, duration, error_message, backend,
                created_at, updated_at, deleted_at, last_checked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $12, $13)
            ON CONFLICT (submission_id) DO UPDATE SET
                artifact_id = EXCLUDED.artifact_id,
                status = EXCLUDED.status,
                file_size = EXCLUDED.file_size,
                duration = EXCLUDED.duration,
                error_message = EXCLUDED.error_message,
                backend = EXCLUDED.backend,
                updated_at = NOW(),
                deleted_at = EXCLUDED.deleted_at,
                last_checked_at = EXCLUDED.last_checked_at
            RETURNING id, artifact_id, submission_id, assignment_id, owner_id,
                      status, file_size, duration, error_message, backend,
                      created_at, updated_at, deleted_at, last_checked_at
            "#,
        )
        .bind(record.id)
        .bind(record.artifact_id)
        .bind(record.submission_id)
        .bind(record.assignment_id)
        .bind(record.owner_id)
        .bind(record.status.to_string())
        .bind(record.file_size.map(|s| s as i64))
        .bind(record.duration)
        .bind(&record.error_message)
        .bind(record.backend.to_string())
        .bind(record.created_at)
        .bind(record.deleted_at)
        .bind(record.last_checked_at)
        .fetch_one(&self.pool)
        .await?;

        VideoRecord::try_from(row)
    }

    async fn get_by_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<Option<VideoRecord>, AppError> {
        let row = sqlx::query_as::<_, VideoRecordRow>(
            r#"
            SELECT id, artifact_id, submission_id, assignment_id, owner_id,
                   status, file_size, duration, error_message, backend,
                   created_at, updated_at, deleted_at, last_checked_at
            FROM video_records
            WHERE submission_id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VideoRecord::try_from).transpose()
    }

    async fn set_status(
        &self,
        submission_id: Uuid,
        status: VideoStatus,
        error_message: Option<String>,
    ) -> Result<bool, AppError> {
        let deleted_at = if status == VideoStatus::Deleted {
            Some(Utc::now())
        } else {
            None
        };

        let result = sqlx::query(
            r#"
            UPDATE video_records
            SET status = $2, error_message = $3,
                deleted_at = COALESCE($4, deleted_at), updated_at = NOW()
            WHERE submission_id = $1
            "#,
        )
        .bind(submission_id)
        .bind(status.to_string())
        .bind(error_message)
        .bind(deleted_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Repository for the shared rate-limit counters
#[derive(Clone)]
pub struct PgRateLimitRepository {
    pool: PgPool,
}

impl PgRateLimitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRepository for PgRateLimitRepository {
    async fn increment(
        &self,
        user_id: Uuid,
        operation: &str,
        hour_bucket: i64,
    ) -> Result<u32, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO rate_limit_counters (user_id, operation, hour_bucket, count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (user_id, operation, hour_bucket)
            DO UPDATE SET count = rate_limit_counters.count + 1
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(operation)
        .bind(hour_bucket)
        .fetch_one(&self.pool)
        .await?;

        let count: i32 = row.try_get("count")?;
        Ok(count.max(0) as u32)
    }
}
