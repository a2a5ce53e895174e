//! Hosted video API store.
//!
//! Speaks the resumable-upload protocol of a hosted video platform: a
//! reservation call creates a TUS-style upload resource with a declared
//! length, chunk writes are `PATCH` requests carrying `Upload-Offset`, and
//! the platform's status endpoint answers processing polls once all bytes
//! are in. Transcoding happens on their side; we only poll.

use crate::traits::{
    ProcessingReport, ProcessingState, ReservedUpload, StoreError, StoreResult, VideoStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;
use vidgate_core::{BackendKind, HostedApiConfig};

const TUS_VERSION: &str = "1.0.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Hosted video store implementation
pub struct HostedVideoStore {
    http_client: Client,
    api_base_url: String,
    api_token: String,
}

impl HostedVideoStore {
    pub fn new(config: &HostedApiConfig) -> StoreResult<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::ConfigError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn upload_url(&self, artifact_id: Uuid) -> String {
        format!("{}/files/{}", self.api_base_url, artifact_id)
    }

    fn status_url(&self, artifact_id: Uuid) -> String {
        format!("{}/videos/{}/status", self.api_base_url, artifact_id)
    }

    fn map_send_error(e: reqwest::Error) -> StoreError {
        if e.is_timeout() || e.is_connect() {
            StoreError::Network(e.to_string())
        } else {
            StoreError::BackendError(e.to_string())
        }
    }

    /// Map a non-success response to the store error taxonomy.
    async fn map_error_response(response: Response) -> StoreError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match status {
            StatusCode::UNAUTHORIZED => StoreError::AuthExpired(body),
            StatusCode::FORBIDDEN => StoreError::Forbidden(body),
            StatusCode::NOT_FOUND => StoreError::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited(body),
            s if s.is_server_error() => StoreError::BackendError(format!("{} - {}", s, body)),
            s => StoreError::BackendError(format!("{} - {}", s, body)),
        }
    }
}

#[async_trait]
impl VideoStore for HostedVideoStore {
    async fn reserve_upload(
        &self,
        artifact_id: Uuid,
        filename: &str,
        content_type: &str,
        expected_size: u64,
    ) -> StoreResult<ReservedUpload> {
        use base64::Engine;
        let metadata = format!(
            "filename {},content_type {}",
            base64::engine::general_purpose::STANDARD.encode(filename),
            base64::engine::general_purpose::STANDARD.encode(content_type)
        );

        let response = self
            .http_client
            .post(self.upload_url(artifact_id))
            .bearer_auth(&self.api_token)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Length", expected_size.to_string())
            .header("Upload-Metadata", metadata)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        // The platform may redirect uploads to a region-local host.
        let upload_endpoint = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.upload_url(artifact_id));

        tracing::info!(
            artifact_id = %artifact_id,
            expected_size = expected_size,
            "Reserved hosted upload"
        );

        Ok(ReservedUpload { upload_endpoint })
    }

    async fn write_chunk(&self, artifact_id: Uuid, offset: u64, data: Bytes) -> StoreResult<()> {
        let size = data.len();
        let response = self
            .http_client
            .patch(self.upload_url(artifact_id))
            .bearer_auth(&self.api_token)
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Offset", offset.to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/offset+octet-stream")
            .body(data)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if response.status() == StatusCode::CONFLICT {
            // The platform reports its confirmed offset on conflict.
            let expected = response
                .headers()
                .get("Upload-Offset")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            return Err(StoreError::OffsetConflict { expected });
        }
        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        tracing::debug!(
            artifact_id = %artifact_id,
            offset = offset,
            size_bytes = size,
            "Hosted chunk write successful"
        );

        Ok(())
    }

    async fn current_offset(&self, artifact_id: Uuid) -> StoreResult<u64> {
        let response = self
            .http_client
            .head(self.upload_url(artifact_id))
            .bearer_auth(&self.api_token)
            .header("Tus-Resumable", TUS_VERSION)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        response
            .headers()
            .get("Upload-Offset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                StoreError::BackendError("Missing Upload-Offset header".to_string())
            })
    }

    async fn finalize_upload(&self, artifact_id: Uuid, _expected_size: u64) -> StoreResult<()> {
        // The resumable protocol completes implicitly when the confirmed
        // offset reaches the declared length; ingestion starts on the
        // platform side.
        tracing::debug!(artifact_id = %artifact_id, "Hosted upload finalized");
        Ok(())
    }

    async fn processing_report(&self, artifact_id: Uuid) -> StoreResult<ProcessingReport> {
        let response = self
            .http_client
            .get(self.status_url(artifact_id))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ProcessingReport {
                state: ProcessingState::Missing,
                file_size: None,
                duration: None,
            });
        }
        if !response.status().is_success() {
            return Err(Self::map_error_response(response).await);
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| StoreError::BackendError(e.to_string()))?;

        let state = match status.status.as_str() {
            "ready" | "complete" => ProcessingState::Ready,
            "missing" | "deleted" => ProcessingState::Missing,
            _ => ProcessingState::Processing,
        };

        Ok(ProcessingReport {
            state,
            file_size: status.file_size,
            duration: status.duration,
        })
    }

    async fn delete_artifact(&self, artifact_id: Uuid) -> StoreResult<()> {
        let response = self
            .http_client
            .delete(self.upload_url(artifact_id))
            .bearer_auth(&self.api_token)
            .header("Tus-Resumable", TUS_VERSION)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        // Already gone counts as cleaned up.
        if response.status() == StatusCode::NOT_FOUND || response.status().is_success() {
            tracing::info!(artifact_id = %artifact_id, "Hosted artifact deleted");
            return Ok(());
        }

        Err(Self::map_error_response(response).await)
    }

    fn playback_resource_path(&self, artifact_id: Uuid) -> String {
        format!("videos/{}", artifact_id)
    }

    fn backend_type(&self) -> BackendKind {
        BackendKind::Hosted
    }
}
