//! Playback grant issuance.
//!
//! Fetch the record, collect capability facts, run the access verifier, and
//! only then sign. The decision is recomputed on every request - an earlier
//! allow is never cached, since roles and record state can change between
//! requests.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use uuid::Uuid;

use vidgate_core::models::SignedGrant;
use vidgate_core::{
    verify_access, AccessDecision, AccessFacts, AppError, BackendKind, CapabilityOracle, Config,
    RateLimitConfig, RecordFacts,
};
use vidgate_db::{RateLimitRepository, VideoRecordRepository};
use vidgate_signing::{CdnGrantIssuer, HostedGrantIssuer};
use vidgate_storage::VideoStore;

use crate::time::Clock;

/// Operation name for the playback-grant rate counter.
pub const OP_PLAYBACK_GRANT: &str = "playback_grant";

const SECS_PER_HOUR: i64 = 3600;

/// A playback request as the caller states it. The claimed artifact id is
/// checked against the record so a substituted id is rejected.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub submission_id: Uuid,
    pub claimed_artifact_id: Uuid,
    /// Optional `response-content-disposition` override, signed into the
    /// resource (CDN backend only).
    pub disposition: Option<String>,
}

pub struct PlaybackService {
    records: Arc<dyn VideoRecordRepository>,
    rate_limits: Arc<dyn RateLimitRepository>,
    store: Arc<dyn VideoStore>,
    clock: Arc<dyn Clock>,
    cdn_issuer: Option<CdnGrantIssuer>,
    hosted_issuer: Option<HostedGrantIssuer>,
    grant_ttl_secs: u64,
    rate_limit: RateLimitConfig,
}

impl PlaybackService {
    pub fn new(
        records: Arc<dyn VideoRecordRepository>,
        rate_limits: Arc<dyn RateLimitRepository>,
        store: Arc<dyn VideoStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Result<Self, AppError> {
        let cdn_issuer = config
            .cdn
            .as_ref()
            .map(CdnGrantIssuer::from_config)
            .transpose()?;
        let hosted_issuer = config.hosted.as_ref().map(HostedGrantIssuer::from_config);

        Ok(Self {
            records,
            rate_limits,
            store,
            clock,
            cdn_issuer,
            hosted_issuer,
            grant_ttl_secs: config.grant_ttl_secs,
            rate_limit: config.rate_limit.clone(),
        })
    }

    /// Issue a signed playback grant for `requester_id`, or deny with a
    /// reason. The oracle is request-scoped: capability facts are collected
    /// fresh for every grant.
    pub async fn issue_playback_grant(
        &self,
        requester_id: Uuid,
        oracle: &dyn CapabilityOracle,
        request: &PlaybackRequest,
    ) -> Result<SignedGrant, AppError> {
        let now = self.clock.now();
        let hour_bucket = now.timestamp().div_euclid(SECS_PER_HOUR);
        let count = self
            .rate_limits
            .increment(requester_id, OP_PLAYBACK_GRANT, hour_bucket)
            .await?;
        if count > self.rate_limit.playback_grants_per_hour {
            return Err(AppError::RateLimited {
                operation: OP_PLAYBACK_GRANT.to_string(),
                retry_after_secs: (SECS_PER_HOUR - now.timestamp().rem_euclid(SECS_PER_HOUR))
                    as u64,
            });
        }

        let record = self
            .records
            .get_by_submission(request.submission_id)
            .await?;

        // Capability facts are only worth fetching when a record exists; a
        // missing record denies regardless.
        let facts = match record.as_ref() {
            Some(record) => {
                let is_owner = record.owner_id == requester_id;
                AccessFacts {
                    record: Some(RecordFacts {
                        artifact_id: record.artifact_id,
                        status: record.status,
                    }),
                    claimed_artifact_id: request.claimed_artifact_id,
                    is_owner,
                    owner_can_submit: is_owner
                        && oracle
                            .can_submit(requester_id, record.assignment_id)
                            .await?,
                    has_grader_capability: oracle
                        .can_grade(requester_id, record.assignment_id)
                        .await?,
                    is_admin: oracle.is_admin(requester_id).await?,
                }
            }
            None => AccessFacts {
                record: None,
                claimed_artifact_id: request.claimed_artifact_id,
                is_owner: false,
                owner_can_submit: false,
                has_grader_capability: false,
                is_admin: false,
            },
        };

        let decision = verify_access(&facts);
        let allow_reason = match decision {
            AccessDecision::Allow(reason) => reason,
            AccessDecision::Deny(reason) => {
                tracing::info!(
                    requester_id = %requester_id,
                    submission_id = %request.submission_id,
                    reason = %reason,
                    "Playback denied"
                );
                return Err(AppError::AccessDenied { reason });
            }
        };

        let record = record.expect("allow decisions imply a record");
        let expires_at = now + ChronoDuration::seconds(self.grant_ttl_secs as i64);

        let grant = match record.backend {
            BackendKind::Hosted => {
                let issuer = self.hosted_issuer.as_ref().ok_or_else(|| {
                    AppError::NotConfigured(
                        "Hosted playback token secret is not configured".to_string(),
                    )
                })?;
                issuer.issue(requester_id, record.artifact_id, expires_at)?
            }
            // The in-memory backend signs like the CDN one when signing
            // material is present, which is how tests exercise this path.
            BackendKind::S3 | BackendKind::Memory => {
                let issuer = self.cdn_issuer.as_ref().ok_or_else(|| {
                    AppError::NotConfigured("CDN signing key is not configured".to_string())
                })?;
                let resource_path = self.store.playback_resource_path(record.artifact_id);
                issuer.issue(&resource_path, expires_at, request.disposition.as_deref())?
            }
        };

        tracing::info!(
            requester_id = %requester_id,
            submission_id = %request.submission_id,
            reason = ?allow_reason,
            expires_at = %grant.expires_at,
            "Playback grant issued"
        );

        Ok(grant)
    }
}
