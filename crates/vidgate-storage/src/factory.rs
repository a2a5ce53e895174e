use crate::{HostedVideoStore, InMemoryVideoStore, S3VideoStore, StoreError, StoreResult, VideoStore};
use std::sync::Arc;
use vidgate_core::{BackendKind, Config};

/// Create a video store backend based on configuration
pub fn build_video_store(config: &Config) -> StoreResult<Arc<dyn VideoStore>> {
    match config.backend {
        BackendKind::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                StoreError::ConfigError("S3_BUCKET and S3_REGION not configured".to_string())
            })?;
            let store = S3VideoStore::new(
                s3.bucket.clone(),
                s3.region.clone(),
                s3.endpoint_url.clone(),
            )?;
            Ok(Arc::new(store))
        }
        BackendKind::Hosted => {
            let hosted = config.hosted.as_ref().ok_or_else(|| {
                StoreError::ConfigError("Hosted video API not configured".to_string())
            })?;
            let store = HostedVideoStore::new(hosted)?;
            Ok(Arc::new(store))
        }
        BackendKind::Memory => Ok(Arc::new(InMemoryVideoStore::new())),
    }
}
