//! Playback access decisions.
//!
//! `verify_access` is a pure decision function over facts the caller has
//! already collected: it does no I/O and its result must be recomputed on
//! every grant request, since roles and record state can change between
//! requests. Capability facts come from a `CapabilityOracle` implemented by
//! the embedding application.

use crate::error::AppError;
use crate::models::VideoStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Why access was denied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum DenyReason {
    /// No video record exists for the submission.
    NotFound,
    /// The caller claimed an artifact id that is not the one bound to the
    /// submission.
    IdentityMismatch,
    /// The record exists but is not ready; carries the current status for
    /// client messaging.
    NotReady(VideoStatus),
    Forbidden,
}

impl DenyReason {
    pub fn client_message(&self) -> String {
        match self {
            DenyReason::NotFound => "Video not found".to_string(),
            DenyReason::IdentityMismatch => {
                "The requested video does not belong to this submission".to_string()
            }
            DenyReason::NotReady(status) => {
                format!("Video is not ready for playback (status: {})", status)
            }
            DenyReason::Forbidden => "You may not view this video".to_string(),
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DenyReason::NotFound => write!(f, "not_found"),
            DenyReason::IdentityMismatch => write!(f, "identity_mismatch"),
            DenyReason::NotReady(status) => write!(f, "not_ready({})", status),
            DenyReason::Forbidden => write!(f, "forbidden"),
        }
    }
}

/// Why access was allowed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    Owner,
    Grader,
    Admin,
}

/// The outcome of an access check. Ephemeral: never persisted, never cached
/// across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(AllowReason),
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }
}

/// What the video record itself contributes to the decision.
#[derive(Debug, Clone, Copy)]
pub struct RecordFacts {
    pub artifact_id: Uuid,
    pub status: VideoStatus,
}

/// Read-only facts the verifier decides over. The caller is responsible for
/// collecting these from the record store and the capability oracle.
#[derive(Debug, Clone, Copy)]
pub struct AccessFacts {
    /// `None` when no record exists for the submission.
    pub record: Option<RecordFacts>,
    /// Artifact id the caller claims to be requesting.
    pub claimed_artifact_id: Uuid,
    pub is_owner: bool,
    /// Whether the owner still holds the submit capability on the assignment.
    pub owner_can_submit: bool,
    pub has_grader_capability: bool,
    pub is_admin: bool,
}

/// Decision table, evaluated top to bottom, first match wins.
///
/// The identity-mismatch check runs before the status check so a caller
/// substituting a foreign artifact id learns nothing about the record.
pub fn verify_access(facts: &AccessFacts) -> AccessDecision {
    let record = match facts.record {
        Some(record) => record,
        None => return AccessDecision::Deny(DenyReason::NotFound),
    };

    if record.artifact_id != facts.claimed_artifact_id {
        return AccessDecision::Deny(DenyReason::IdentityMismatch);
    }

    if record.status != VideoStatus::Ready {
        return AccessDecision::Deny(DenyReason::NotReady(record.status));
    }

    if facts.is_owner && facts.owner_can_submit {
        return AccessDecision::Allow(AllowReason::Owner);
    }

    if facts.has_grader_capability {
        return AccessDecision::Allow(AllowReason::Grader);
    }

    if facts.is_admin {
        return AccessDecision::Allow(AllowReason::Admin);
    }

    AccessDecision::Deny(DenyReason::Forbidden)
}

/// Answers capability questions about a user. Implemented by the embedding
/// application (e.g. backed by its role/enrolment tables); Vidgate only
/// consumes the answers.
#[async_trait]
pub trait CapabilityOracle: Send + Sync {
    async fn can_submit(&self, user_id: Uuid, assignment_id: Uuid) -> Result<bool, AppError>;

    async fn can_grade(&self, user_id: Uuid, assignment_id: Uuid) -> Result<bool, AppError>;

    async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError>;
}
