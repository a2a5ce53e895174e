//! Video store trait
//!
//! All remote backends (S3-compatible, hosted video API, in-memory) implement
//! this trait. Business logic works against `Arc<dyn VideoStore>` and never
//! couples to a specific backend.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;
use vidgate_core::BackendKind;

/// Store operation errors.
///
/// `is_transient` drives the retry controller: network failures, backend 5xx,
/// rate limiting, and expired backend auth are worth retrying; everything
/// else is permanent.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Reservation failed: {0}")]
    ReserveFailed(String),

    #[error("Chunk write failed: {0}")]
    WriteFailed(String),

    #[error("Finalize failed: {0}")]
    FinalizeFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Offset conflict: backend expects {expected}")]
    OffsetConflict { expected: u64 },

    #[error("Backend rate limited: {0}")]
    RateLimited(String),

    #[error("Backend auth expired: {0}")]
    AuthExpired(String),

    #[error("Forbidden by backend: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StoreError {
    /// Transient errors are expected to succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Network(_)
                | StoreError::BackendError(_)
                | StoreError::RateLimited(_)
                | StoreError::AuthExpired(_)
        )
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A reserved remote upload slot.
#[derive(Debug, Clone)]
pub struct ReservedUpload {
    /// Where the client (or the transport on its behalf) sends bytes:
    /// a presigned PUT URL for S3, a resumable upload URL for the hosted
    /// API.
    pub upload_endpoint: String,
}

/// What the backend says about an artifact after transport completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingState {
    /// Still transcoding/ingesting; poll again later.
    Processing,
    Ready,
    /// The backend has no such artifact (expired reservation, remote purge).
    Missing,
}

#[derive(Debug, Clone)]
pub struct ProcessingReport {
    pub state: ProcessingState,
    pub file_size: Option<u64>,
    /// Seconds, when the backend probes media metadata.
    pub duration: Option<f64>,
}

/// Remote video store abstraction.
///
/// Chunk writes are strictly offset-ordered per artifact; a backend rejects
/// gaps and overlaps with `OffsetConflict`. `delete_artifact` treats a
/// missing artifact as success so cleanup and the reaper stay idempotent.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Reserve an artifact identity and an upload endpoint. Must be called
    /// before any chunk write; safe to retry for the same artifact id.
    async fn reserve_upload(
        &self,
        artifact_id: Uuid,
        filename: &str,
        content_type: &str,
        expected_size: u64,
    ) -> StoreResult<ReservedUpload>;

    /// Append `data` at `offset`. `offset` must equal the number of bytes
    /// the backend has already accepted for this artifact.
    async fn write_chunk(&self, artifact_id: Uuid, offset: u64, data: Bytes) -> StoreResult<()>;

    /// Bytes the backend has accepted so far; resumption starts here.
    async fn current_offset(&self, artifact_id: Uuid) -> StoreResult<u64>;

    /// Promote the accepted bytes to a finished artifact once all
    /// `expected_size` bytes are in.
    async fn finalize_upload(&self, artifact_id: Uuid, expected_size: u64) -> StoreResult<()>;

    /// Processing status after transport completion.
    async fn processing_report(&self, artifact_id: Uuid) -> StoreResult<ProcessingReport>;

    /// Delete the artifact and any partial chunks. Missing artifacts are
    /// success, not an error.
    async fn delete_artifact(&self, artifact_id: Uuid) -> StoreResult<()>;

    /// Path component the playback grant is issued for (CDN backends).
    fn playback_resource_path(&self, artifact_id: Uuid) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> BackendKind;
}
