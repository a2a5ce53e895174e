//! Shared application state.

use std::sync::Arc;
use vidgate_core::Config;
use vidgate_services::{
    ChunkTransport, ConfirmationService, PlaybackService, StaleUploadReaper, UploadSessionService,
};

pub struct AppState {
    pub config: Config,
    pub sessions: UploadSessionService,
    pub transport: ChunkTransport,
    pub confirmation: ConfirmationService,
    pub playback: PlaybackService,
    pub reaper: Arc<StaleUploadReaper>,
}
