//! In-memory video store for tests and local development.
//!
//! Implements the same offset-ordered contract as the remote backends, plus
//! a few knobs tests use to simulate slow processing and transient write
//! failures.

use crate::traits::{
    ProcessingReport, ProcessingState, ReservedUpload, StoreError, StoreResult, VideoStore,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;
use vidgate_core::BackendKind;

#[derive(Debug)]
struct MemArtifact {
    buffer: Vec<u8>,
    expected_size: u64,
    finalized: bool,
    /// Processing polls left before the artifact reports ready.
    polls_until_ready: u32,
    duration: Option<f64>,
}

#[derive(Debug, Default)]
struct MemState {
    artifacts: HashMap<Uuid, MemArtifact>,
    /// Next N chunk writes fail with a transient error.
    failing_writes: u32,
    delete_calls: u64,
    status_calls: u64,
}

/// In-memory video store implementation
#[derive(Debug, Default)]
pub struct InMemoryVideoStore {
    state: Mutex<MemState>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` chunk writes fail with a transient backend error.
    pub fn fail_next_writes(&self, n: u32) {
        self.state.lock().unwrap().failing_writes = n;
    }

    /// Require `polls` processing polls before an artifact reports ready.
    pub fn set_polls_until_ready(&self, artifact_id: Uuid, polls: u32) {
        if let Some(artifact) = self.state.lock().unwrap().artifacts.get_mut(&artifact_id) {
            artifact.polls_until_ready = polls;
        }
    }

    /// Report this duration once the artifact is ready.
    pub fn set_duration(&self, artifact_id: Uuid, duration: f64) {
        if let Some(artifact) = self.state.lock().unwrap().artifacts.get_mut(&artifact_id) {
            artifact.duration = Some(duration);
        }
    }

    pub fn contains(&self, artifact_id: Uuid) -> bool {
        self.state.lock().unwrap().artifacts.contains_key(&artifact_id)
    }

    pub fn delete_calls(&self) -> u64 {
        self.state.lock().unwrap().delete_calls
    }

    /// Processing polls issued so far; idempotence tests assert this stays
    /// flat across repeated confirms.
    pub fn status_calls(&self) -> u64 {
        self.state.lock().unwrap().status_calls
    }

    pub fn artifact_bytes(&self, artifact_id: Uuid) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .artifacts
            .get(&artifact_id)
            .map(|a| a.buffer.clone())
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn reserve_upload(
        &self,
        artifact_id: Uuid,
        _filename: &str,
        _content_type: &str,
        expected_size: u64,
    ) -> StoreResult<ReservedUpload> {
        let mut state = self.state.lock().unwrap();
        state.artifacts.entry(artifact_id).or_insert(MemArtifact {
            buffer: Vec::new(),
            expected_size,
            finalized: false,
            polls_until_ready: 0,
            duration: None,
        });
        Ok(ReservedUpload {
            upload_endpoint: format!("mem://uploads/{}", artifact_id),
        })
    }

    async fn write_chunk(&self, artifact_id: Uuid, offset: u64, data: Bytes) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(StoreError::Network("simulated connection reset".to_string()));
        }
        let artifact = state
            .artifacts
            .get_mut(&artifact_id)
            .ok_or_else(|| StoreError::NotFound(format!("No reservation for {}", artifact_id)))?;

        let confirmed = artifact.buffer.len() as u64;
        if offset != confirmed {
            return Err(StoreError::OffsetConflict {
                expected: confirmed,
            });
        }
        if confirmed + data.len() as u64 > artifact.expected_size {
            return Err(StoreError::WriteFailed(format!(
                "Write past declared size {}",
                artifact.expected_size
            )));
        }
        artifact.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn current_offset(&self, artifact_id: Uuid) -> StoreResult<u64> {
        let state = self.state.lock().unwrap();
        state
            .artifacts
            .get(&artifact_id)
            .map(|a| a.buffer.len() as u64)
            .ok_or_else(|| StoreError::NotFound(format!("No reservation for {}", artifact_id)))
    }

    async fn finalize_upload(&self, artifact_id: Uuid, expected_size: u64) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let artifact = state
            .artifacts
            .get_mut(&artifact_id)
            .ok_or_else(|| StoreError::NotFound(format!("No reservation for {}", artifact_id)))?;
        if artifact.buffer.len() as u64 != expected_size {
            return Err(StoreError::FinalizeFailed(format!(
                "Staged {} bytes but expected {}",
                artifact.buffer.len(),
                expected_size
            )));
        }
        artifact.finalized = true;
        Ok(())
    }

    async fn processing_report(&self, artifact_id: Uuid) -> StoreResult<ProcessingReport> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        let artifact = match state.artifacts.get_mut(&artifact_id) {
            Some(a) => a,
            None => {
                return Ok(ProcessingReport {
                    state: ProcessingState::Missing,
                    file_size: None,
                    duration: None,
                })
            }
        };

        if !artifact.finalized || artifact.polls_until_ready > 0 {
            if artifact.polls_until_ready > 0 {
                artifact.polls_until_ready -= 1;
            }
            return Ok(ProcessingReport {
                state: ProcessingState::Processing,
                file_size: None,
                duration: None,
            });
        }

        Ok(ProcessingReport {
            state: ProcessingState::Ready,
            file_size: Some(artifact.buffer.len() as u64),
            duration: artifact.duration,
        })
    }

    async fn delete_artifact(&self, artifact_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        // Missing artifacts count as already cleaned up.
        state.artifacts.remove(&artifact_id);
        Ok(())
    }

    fn playback_resource_path(&self, artifact_id: Uuid) -> String {
        format!("videos/{}.mp4", artifact_id)
    }

    fn backend_type(&self) -> BackendKind {
        BackendKind::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offset_contract_enforced() {
        let store = InMemoryVideoStore::new();
        let artifact = Uuid::new_v4();
        store
            .reserve_upload(artifact, "a.mp4", "video/mp4", 10)
            .await
            .unwrap();

        store
            .write_chunk(artifact, 0, Bytes::from_static(b"hello"))
            .await
            .unwrap();

        let gap = store
            .write_chunk(artifact, 7, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(gap, StoreError::OffsetConflict { expected: 5 }));

        store
            .write_chunk(artifact, 5, Bytes::from_static(b"world"))
            .await
            .unwrap();
        assert_eq!(store.current_offset(artifact).await.unwrap(), 10);
        store.finalize_upload(artifact, 10).await.unwrap();

        let report = store.processing_report(artifact).await.unwrap();
        assert_eq!(report.state, ProcessingState::Ready);
        assert_eq!(report.file_size, Some(10));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryVideoStore::new();
        let artifact = Uuid::new_v4();
        store
            .reserve_upload(artifact, "a.mp4", "video/mp4", 1)
            .await
            .unwrap();

        store.delete_artifact(artifact).await.unwrap();
        store.delete_artifact(artifact).await.unwrap();
        assert_eq!(store.delete_calls(), 2);
        assert!(!store.contains(artifact));
    }
}
