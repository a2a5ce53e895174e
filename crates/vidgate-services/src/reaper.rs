//! Orphan/stale-upload reaper.
//!
//! Sessions that never reached a terminal state by their deadline hold a
//! reserved remote artifact hostage. The sweep releases the remote side
//! (treating an already-deleted artifact as success) and marks the local
//! state, so a dropped fire-and-forget cancel is eventually replayed here.
//! Every step is idempotent, which is what makes overlapping scheduler
//! ticks safe without locking.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use vidgate_core::models::{SessionStatus, VideoStatus};
use vidgate_core::{Config, ReaperConfig};
use vidgate_db::{SessionRepository, VideoRecordRepository};
use vidgate_storage::VideoStore;

use crate::time::Clock;

pub struct StaleUploadReaper {
    sessions: Arc<dyn SessionRepository>,
    records: Arc<dyn VideoRecordRepository>,
    store: Arc<dyn VideoStore>,
    clock: Arc<dyn Clock>,
    reaper: ReaperConfig,
}

impl StaleUploadReaper {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        records: Arc<dyn VideoRecordRepository>,
        store: Arc<dyn VideoStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            records,
            store,
            clock,
            reaper: config.reaper.clone(),
        }
    }

    /// Start the background sweep task.
    /// Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(Duration::from_secs(self.reaper.sweep_interval_secs));

            loop {
                sweep_interval.tick().await;

                match self.sweep().await {
                    Ok(reaped) if reaped > 0 => {
                        tracing::info!(reaped, "Stale-upload sweep completed");
                    }
                    Ok(_) => {
                        tracing::debug!("Stale-upload sweep found nothing to do");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Stale-upload sweep failed");
                    }
                }
            }
        })
    }

    /// Sweep sessions past their deadline. Per-session failures are logged
    /// and skipped so one bad artifact cannot wedge the sweep.
    pub async fn sweep(&self) -> Result<usize, anyhow::Error> {
        let now = self.clock.now();
        let stale = self.sessions.list_stale(now).await?;
        let mut reaped = 0;

        for session in stale {
            tracing::info!(
                session_id = %session.id,
                artifact_id = %session.artifact_id,
                created_at = %session.created_at,
                deadline = %session.deadline,
                "Reaping stale upload session"
            );

            // Remote first: if this tick dies after the delete, the next
            // tick re-deletes a missing artifact, which is a no-op.
            if let Err(e) = self.store.delete_artifact(session.artifact_id).await {
                tracing::error!(
                    error = %e,
                    artifact_id = %session.artifact_id,
                    "Failed to delete remote artifact, leaving session for the next sweep"
                );
                continue;
            }

            if let Err(e) = self
                .sessions
                .update_status(session.id, SessionStatus::Deleted)
                .await
            {
                tracing::error!(error = %e, session_id = %session.id, "Failed to mark session deleted");
                continue;
            }

            match self
                .records
                .set_status(
                    session.submission_id,
                    VideoStatus::Error,
                    Some("Upload abandoned before completion".to_string()),
                )
                .await
            {
                Ok(true) => {
                    tracing::debug!(submission_id = %session.submission_id, "Marked video record failed");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, submission_id = %session.submission_id, "Failed to mark video record");
                }
            }

            reaped += 1;
        }

        Ok(reaped)
    }
}
