//! Shared test fixtures: an in-memory service stack with a manual clock and
//! a recording sleeper, so no test waits on the wall clock.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use vidgate_core::models::NewUploadSession;
use vidgate_core::{AppError, CapabilityOracle, CdnConfig, Config};
use vidgate_db::{
    InMemoryRateLimitRepository, InMemorySessionRepository, InMemoryVideoRecordRepository,
    RateLimitRepository, SessionRepository, VideoRecordRepository,
};
use vidgate_services::{
    ChunkTransport, Clock, ConfirmationService, ManualClock, NoopSleeper, PlaybackService,
    Sleeper, StaleUploadReaper, UploadSessionService,
};
use vidgate_storage::{InMemoryVideoStore, VideoStore};

pub const TEST_KEY_PEM: &str = include_str!("../testdata/cdn_test_key.pem");

/// Role-set oracle: capability answers depend on the user only, which is all
/// these tests need.
#[derive(Default)]
pub struct StaticOracle {
    submitters: Mutex<HashSet<Uuid>>,
    graders: Mutex<HashSet<Uuid>>,
    admins: Mutex<HashSet<Uuid>>,
}

impl StaticOracle {
    pub fn grant_submit(&self, user: Uuid) {
        self.submitters.lock().unwrap().insert(user);
    }

    pub fn grant_grade(&self, user: Uuid) {
        self.graders.lock().unwrap().insert(user);
    }

    pub fn grant_admin(&self, user: Uuid) {
        self.admins.lock().unwrap().insert(user);
    }

    pub fn revoke_submit(&self, user: Uuid) {
        self.submitters.lock().unwrap().remove(&user);
    }
}

#[async_trait::async_trait]
impl CapabilityOracle for StaticOracle {
    async fn can_submit(&self, user_id: Uuid, _assignment_id: Uuid) -> Result<bool, AppError> {
        Ok(self.submitters.lock().unwrap().contains(&user_id))
    }

    async fn can_grade(&self, user_id: Uuid, _assignment_id: Uuid) -> Result<bool, AppError> {
        Ok(self.graders.lock().unwrap().contains(&user_id))
    }

    async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.admins.lock().unwrap().contains(&user_id))
    }
}

pub struct TestStack {
    pub sessions: Arc<InMemorySessionRepository>,
    pub records: Arc<InMemoryVideoRecordRepository>,
    pub rate_limits: Arc<InMemoryRateLimitRepository>,
    pub store: Arc<InMemoryVideoStore>,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<NoopSleeper>,
    pub oracle: Arc<StaticOracle>,
    pub config: Config,
    pub session_service: UploadSessionService,
    pub transport: ChunkTransport,
    pub confirmation: ConfirmationService,
    pub playback: PlaybackService,
    pub reaper: StaleUploadReaper,
}

pub fn test_config() -> Config {
    let mut config = Config::for_tests();
    config.cdn = Some(CdnConfig {
        base_url: "https://cdn.example.edu".to_string(),
        key_pair_id: "APKTESTKEYPAIR".to_string(),
        private_key_pem: TEST_KEY_PEM.to_string(),
    });
    config
}

pub fn stack() -> TestStack {
    stack_with(test_config())
}

pub fn stack_with(config: Config) -> TestStack {
    let sessions = Arc::new(InMemorySessionRepository::new());
    let records = Arc::new(InMemoryVideoRecordRepository::new());
    let rate_limits = Arc::new(InMemoryRateLimitRepository::new());
    let store = Arc::new(InMemoryVideoStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ));
    let sleeper = Arc::new(NoopSleeper::new());
    let oracle = Arc::new(StaticOracle::default());

    let sessions_dyn: Arc<dyn SessionRepository> = sessions.clone();
    let records_dyn: Arc<dyn VideoRecordRepository> = records.clone();
    let rate_limits_dyn: Arc<dyn RateLimitRepository> = rate_limits.clone();
    let store_dyn: Arc<dyn VideoStore> = store.clone();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let sleeper_dyn: Arc<dyn Sleeper> = sleeper.clone();

    let session_service = UploadSessionService::new(
        sessions_dyn.clone(),
        records_dyn.clone(),
        rate_limits_dyn.clone(),
        store_dyn.clone(),
        clock_dyn.clone(),
        sleeper_dyn.clone(),
        &config,
    );
    let transport = ChunkTransport::new(
        sessions_dyn.clone(),
        store_dyn.clone(),
        clock_dyn.clone(),
        sleeper_dyn.clone(),
        &config,
    );
    let confirmation = ConfirmationService::new(
        sessions_dyn.clone(),
        records_dyn.clone(),
        store_dyn.clone(),
        clock_dyn.clone(),
        sleeper_dyn.clone(),
        &config,
    );
    let playback = PlaybackService::new(
        records_dyn.clone(),
        rate_limits_dyn.clone(),
        store_dyn.clone(),
        clock_dyn.clone(),
        &config,
    )
    .expect("test CDN config is valid");
    let reaper = StaleUploadReaper::new(
        sessions_dyn,
        records_dyn,
        store_dyn,
        clock_dyn,
        &config,
    );

    TestStack {
        sessions,
        records,
        rate_limits,
        store,
        clock,
        sleeper,
        oracle,
        config,
        session_service,
        transport,
        confirmation,
        playback,
        reaper,
    }
}

pub fn upload_request(file_size: u64) -> NewUploadSession {
    NewUploadSession {
        assignment_id: Uuid::new_v4(),
        submission_id: Uuid::new_v4(),
        filename: "lecture.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        file_size,
        idempotency_key: None,
    }
}

pub const MIB: u64 = 1024 * 1024;
