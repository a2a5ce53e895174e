//! S3-compatible video store.
//!
//! Chunks land as individual objects under `uploads/chunked/{artifact}/`,
//! tracked by a small manifest object next to them; finalize concatenates
//! them into the finished artifact under `videos/` and removes the staging
//! objects. Playback is served through a CDN in front of the bucket, so the
//! store only needs the resource path, not a signed URL.

use crate::traits::{
    ProcessingReport, ProcessingState, ReservedUpload, StoreError, StoreResult, VideoStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use vidgate_core::BackendKind;

/// How long a presigned PUT endpoint stays valid.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct ChunkEntry {
    offset: u64,
    len: u64,
    key: String,
}

/// Staging bookkeeping stored next to the chunk objects, so that offset
/// queries and finalize never have to list the bucket.
#[derive(Debug, Serialize, Deserialize)]
struct ChunkManifest {
    expected_size: u64,
    entries: Vec<ChunkEntry>,
}

impl ChunkManifest {
    fn confirmed(&self) -> u64 {
        self.entries.iter().map(|e| e.len).sum()
    }
}

/// S3 video store implementation
#[derive(Clone)]
pub struct S3VideoStore {
    store: AmazonS3,
    bucket: String,
}

impl S3VideoStore {
    /// Create a new S3VideoStore.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible
    ///   providers (e.g., "http://localhost:9000" for MinIO)
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StoreResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::ConfigError(e.to_string()))?;

        Ok(S3VideoStore { store, bucket })
    }

    fn staging_prefix(artifact_id: Uuid) -> String {
        format!("uploads/chunked/{}", artifact_id)
    }

    fn manifest_key(artifact_id: Uuid) -> String {
        format!("{}/manifest.json", Self::staging_prefix(artifact_id))
    }

    fn chunk_key(artifact_id: Uuid, offset: u64) -> String {
        // Zero-padded so lexical order matches byte order.
        format!("{}/{:020}", Self::staging_prefix(artifact_id), offset)
    }

    fn final_key(artifact_id: Uuid) -> String {
        format!("videos/{}.mp4", artifact_id)
    }

    async fn read_manifest(&self, artifact_id: Uuid) -> StoreResult<Option<ChunkManifest>> {
        let location = Path::from(Self::manifest_key(artifact_id));
        let result: ObjectResult<_> = self.store.get(&location).await;
        match result {
            Ok(get) => {
                let bytes = get
                    .bytes()
                    .await
                    .map_err(|e| StoreError::BackendError(e.to_string()))?;
                let manifest = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::BackendError(format!("Corrupt manifest: {}", e)))?;
                Ok(Some(manifest))
            }
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(map_object_store_error(e)),
        }
    }

    async fn write_manifest(
        &self,
        artifact_id: Uuid,
        manifest: &ChunkManifest,
    ) -> StoreResult<()> {
        let location = Path::from(Self::manifest_key(artifact_id));
        let payload = serde_json::to_vec(manifest)
            .map_err(|e| StoreError::BackendError(e.to_string()))?;
        self.store
            .put(&location, PutPayload::from(Bytes::from(payload)))
            .await
            .map_err(map_object_store_error)?;
        Ok(())
    }

    /// Delete a key, treating NotFound as success.
    async fn delete_quiet(&self, key: &str) -> StoreResult<()> {
        let location = Path::from(key.to_string());
        match self.store.delete(&location).await {
            Ok(_) => Ok(()),
            Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(map_object_store_error(e)),
        }
    }
}

fn map_object_store_error(e: ObjectStoreError) -> StoreError {
    match e {
        ObjectStoreError::NotFound { path, .. } => StoreError::NotFound(path),
        other => StoreError::BackendError(other.to_string()),
    }
}

#[async_trait]
impl VideoStore for S3VideoStore {
    async fn reserve_upload(
        &self,
        artifact_id: Uuid,
        _filename: &str,
        _content_type: &str,
        expected_size: u64,
    ) -> StoreResult<ReservedUpload> {
        // A retried reservation keeps existing staging state.
        if self.read_manifest(artifact_id).await?.is_none() {
            self.write_manifest(
                artifact_id,
                &ChunkManifest {
                    expected_size,
                    entries: Vec::new(),
                },
            )
            .await?;
        }

        let location = Path::from(Self::final_key(artifact_id));
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::PUT, &location, UPLOAD_URL_TTL)
            .await;
        let upload_endpoint = url_result
            .map_err(|e| StoreError::ReserveFailed(e.to_string()))?
            .to_string();

        tracing::info!(
            bucket = %self.bucket,
            artifact_id = %artifact_id,
            expected_size = expected_size,
            "Reserved S3 upload"
        );

        Ok(ReservedUpload { upload_endpoint })
    }

    async fn write_chunk(&self, artifact_id: Uuid, offset: u64, data: Bytes) -> StoreResult<()> {
        let mut manifest = self
            .read_manifest(artifact_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("No reservation for {}", artifact_id)))?;

        let confirmed = manifest.confirmed();
        if offset != confirmed {
            return Err(StoreError::OffsetConflict {
                expected: confirmed,
            });
        }

        let key = Self::chunk_key(artifact_id, offset);
        let len = data.len() as u64;
        let location = Path::from(key.clone());
        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;

        manifest.entries.push(ChunkEntry { offset, len, key });
        self.write_manifest(artifact_id, &manifest).await?;

        tracing::debug!(
            bucket = %self.bucket,
            artifact_id = %artifact_id,
            offset = offset,
            size_bytes = len,
            "S3 chunk write successful"
        );

        Ok(())
    }

    async fn current_offset(&self, artifact_id: Uuid) -> StoreResult<u64> {
        let manifest = self
            .read_manifest(artifact_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("No reservation for {}", artifact_id)))?;
        Ok(manifest.confirmed())
    }

    async fn finalize_upload(&self, artifact_id: Uuid, expected_size: u64) -> StoreResult<()> {
        let manifest = self
            .read_manifest(artifact_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("No reservation for {}", artifact_id)))?;

        let confirmed = manifest.confirmed();
        if confirmed != expected_size {
            return Err(StoreError::FinalizeFailed(format!(
                "Staged {} bytes but expected {}",
                confirmed, expected_size
            )));
        }

        // Concatenate staged chunks into the finished artifact. Size is
        // bounded by the configured upload ceiling enforced at session
        // creation.
        let mut combined = Vec::with_capacity(expected_size as usize);
        for entry in &manifest.entries {
            let location = Path::from(entry.key.clone());
            let get = self
                .store
                .get(&location)
                .await
                .map_err(map_object_store_error)?;
            let bytes = get
                .bytes()
                .await
                .map_err(|e| StoreError::BackendError(e.to_string()))?;
            combined.extend_from_slice(&bytes);
        }

        let final_location = Path::from(Self::final_key(artifact_id));
        self.store
            .put(&final_location, PutPayload::from(Bytes::from(combined)))
            .await
            .map_err(|e| StoreError::FinalizeFailed(e.to_string()))?;

        for entry in &manifest.entries {
            if let Err(e) = self.delete_quiet(&entry.key).await {
                tracing::warn!(
                    error = %e,
                    storage_key = %entry.key,
                    "Failed to delete staged chunk during finalize"
                );
            }
        }
        if let Err(e) = self.delete_quiet(&Self::manifest_key(artifact_id)).await {
            tracing::warn!(error = %e, artifact_id = %artifact_id, "Failed to delete chunk manifest");
        }

        tracing::info!(
            bucket = %self.bucket,
            artifact_id = %artifact_id,
            size_bytes = expected_size,
            parts = manifest.entries.len(),
            "S3 upload finalized"
        );

        Ok(())
    }

    async fn processing_report(&self, artifact_id: Uuid) -> StoreResult<ProcessingReport> {
        let final_location = Path::from(Self::final_key(artifact_id));
        match self.store.head(&final_location).await {
            Ok(meta) => Ok(ProcessingReport {
                state: ProcessingState::Ready,
                file_size: Some(meta.size),
                // Object storage stores bytes; media probing belongs to a
                // processing pipeline this backend does not run.
                duration: None,
            }),
            Err(ObjectStoreError::NotFound { .. }) => {
                if self.read_manifest(artifact_id).await?.is_some() {
                    Ok(ProcessingReport {
                        state: ProcessingState::Processing,
                        file_size: None,
                        duration: None,
                    })
                } else {
                    Ok(ProcessingReport {
                        state: ProcessingState::Missing,
                        file_size: None,
                        duration: None,
                    })
                }
            }
            Err(e) => Err(map_object_store_error(e)),
        }
    }

    async fn delete_artifact(&self, artifact_id: Uuid) -> StoreResult<()> {
        self.delete_quiet(&Self::final_key(artifact_id)).await?;

        if let Some(manifest) = self.read_manifest(artifact_id).await? {
            for entry in &manifest.entries {
                self.delete_quiet(&entry.key).await?;
            }
        }
        self.delete_quiet(&Self::manifest_key(artifact_id)).await?;

        tracing::info!(
            bucket = %self.bucket,
            artifact_id = %artifact_id,
            "S3 artifact deleted"
        );

        Ok(())
    }

    fn playback_resource_path(&self, artifact_id: Uuid) -> String {
        Self::final_key(artifact_id)
    }

    fn backend_type(&self) -> BackendKind {
        BackendKind::S3
    }
}
