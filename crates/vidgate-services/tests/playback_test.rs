mod helpers;

use bytes::Bytes;
use chrono::Duration as ChronoDuration;
use helpers::{stack, stack_with, test_config, upload_request, MIB};
use uuid::Uuid;
use vidgate_core::models::{UploadSession, VideoRecord, VideoStatus};
use vidgate_core::{AppError, BackendKind, DenyReason, HostedApiConfig};
use vidgate_db::VideoRecordRepository;
use vidgate_services::Clock;
use vidgate_services::PlaybackRequest;
use vidgate_signing::{CdnGrantIssuer, HostedGrantIssuer};

/// Upload and confirm a 1 MiB submission owned by `owner`.
async fn ready_submission(stack: &helpers::TestStack, owner: Uuid) -> UploadSession {
    let session = stack
        .session_service
        .create_session(owner, upload_request(MIB))
        .await
        .unwrap();
    stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, Bytes::from(vec![1u8; MIB as usize]))
        .await
        .unwrap();
    stack.confirmation.confirm_upload(session.owner_id, session.id).await.unwrap();
    session
}

fn request_for(session: &UploadSession) -> PlaybackRequest {
    PlaybackRequest {
        submission_id: session.submission_id,
        claimed_artifact_id: session.artifact_id,
        disposition: None,
    }
}

#[tokio::test]
async fn owner_gets_a_grant_that_verifies_until_expiry() {
    let stack = stack();
    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);

    let session = ready_submission(&stack, owner).await;
    let now = stack.clock.now();

    let grant = stack
        .playback
        .issue_playback_grant(owner, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap();

    // ttl_seconds=3600: expiry lands exactly one hour out.
    assert_eq!(grant.expires_at, now + ChronoDuration::seconds(3600));
    assert!(grant.expires_at > now);

    // Re-verify against the same key: valid before expiry, dead after.
    let issuer = CdnGrantIssuer::from_config(stack.config.cdn.as_ref().unwrap()).unwrap();
    assert!(issuer.verify_grant(&grant.url_or_token, now).is_ok());
    assert!(issuer
        .verify_grant(&grant.url_or_token, now + ChronoDuration::seconds(3599))
        .is_ok());
    assert!(issuer
        .verify_grant(&grant.url_or_token, now + ChronoDuration::seconds(3600))
        .is_err());
}

#[tokio::test]
async fn grader_and_admin_are_allowed_strangers_are_not() {
    let stack = stack();
    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);
    let session = ready_submission(&stack, owner).await;

    let grader = Uuid::new_v4();
    stack.oracle.grant_grade(grader);
    stack
        .playback
        .issue_playback_grant(grader, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap();

    let admin = Uuid::new_v4();
    stack.oracle.grant_admin(admin);
    stack
        .playback
        .issue_playback_grant(admin, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap();

    let stranger = Uuid::new_v4();
    let err = stack
        .playback
        .issue_playback_grant(stranger, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::AccessDenied {
            reason: DenyReason::Forbidden
        }
    ));
}

#[tokio::test]
async fn decisions_are_recomputed_each_request() {
    let stack = stack();
    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);
    let session = ready_submission(&stack, owner).await;

    stack
        .playback
        .issue_playback_grant(owner, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap();

    // Losing the submit capability (e.g. unenrolled) takes effect on the
    // very next request: no allow is cached.
    stack.oracle.revoke_submit(owner);
    let err = stack
        .playback
        .issue_playback_grant(owner, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::AccessDenied {
            reason: DenyReason::Forbidden
        }
    ));
}

#[tokio::test]
async fn substituted_artifact_id_is_denied() {
    let stack = stack();
    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);
    let session = ready_submission(&stack, owner).await;

    let mut request = request_for(&session);
    request.claimed_artifact_id = Uuid::new_v4();
    let err = stack
        .playback
        .issue_playback_grant(owner, stack.oracle.as_ref(), &request)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::AccessDenied {
            reason: DenyReason::IdentityMismatch
        }
    ));
}

#[tokio::test]
async fn unready_and_unknown_submissions_are_denied() {
    let stack = stack();
    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);

    // Uploaded but the backend still reports processing.
    let session = stack
        .session_service
        .create_session(owner, upload_request(MIB))
        .await
        .unwrap();
    stack.store.set_polls_until_ready(session.artifact_id, 100);
    stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, Bytes::from(vec![1u8; MIB as usize]))
        .await
        .unwrap();
    stack.confirmation.confirm_upload(session.owner_id, session.id).await.unwrap();

    let err = stack
        .playback
        .issue_playback_grant(owner, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::AccessDenied {
            reason: DenyReason::NotReady(VideoStatus::Uploading)
        }
    ));

    let err = stack
        .playback
        .issue_playback_grant(
            owner,
            stack.oracle.as_ref(),
            &PlaybackRequest {
                submission_id: Uuid::new_v4(),
                claimed_artifact_id: Uuid::new_v4(),
                disposition: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::AccessDenied {
            reason: DenyReason::NotFound
        }
    ));
}

#[tokio::test]
async fn grant_requests_are_rate_limited() {
    let mut config = test_config();
    config.rate_limit.playback_grants_per_hour = 2;
    let stack = stack_with(config);
    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);
    let session = ready_submission(&stack, owner).await;

    for _ in 0..2 {
        stack
            .playback
            .issue_playback_grant(owner, stack.oracle.as_ref(), &request_for(&session))
            .await
            .unwrap();
    }
    let err = stack
        .playback
        .issue_playback_grant(owner, stack.oracle.as_ref(), &request_for(&session))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RateLimited { .. }));
}

#[tokio::test]
async fn disposition_override_is_part_of_the_signed_url() {
    let stack = stack();
    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);
    let session = ready_submission(&stack, owner).await;

    let mut request = request_for(&session);
    request.disposition = Some("attachment; filename=\"lecture.mp4\"".to_string());
    let grant = stack
        .playback
        .issue_playback_grant(owner, stack.oracle.as_ref(), &request)
        .await
        .unwrap();

    assert!(grant
        .url_or_token
        .contains("response-content-disposition="));
    let issuer = CdnGrantIssuer::from_config(stack.config.cdn.as_ref().unwrap()).unwrap();
    assert!(issuer
        .verify_grant(&grant.url_or_token, stack.clock.now())
        .is_ok());
}

#[tokio::test]
async fn hosted_records_get_bearer_tokens() {
    let mut config = test_config();
    config.hosted = Some(HostedApiConfig {
        api_base_url: "https://video.example.com/api".to_string(),
        api_token: "svc-token".to_string(),
        token_secret: "a-very-long-token-secret-for-tests".to_string(),
    });
    let stack = stack_with(config);

    let owner = Uuid::new_v4();
    stack.oracle.grant_submit(owner);

    // A record that lives on the hosted backend.
    let now = stack.clock.now();
    let record = VideoRecord {
        id: Uuid::new_v4(),
        artifact_id: Uuid::new_v4(),
        submission_id: Uuid::new_v4(),
        assignment_id: Uuid::new_v4(),
        owner_id: owner,
        status: VideoStatus::Ready,
        file_size: Some(MIB),
        duration: Some(60.0),
        error_message: None,
        backend: BackendKind::Hosted,
        created_at: now,
        updated_at: now,
        deleted_at: None,
        last_checked_at: Some(now),
    };
    stack.records.upsert_for_submission(&record).await.unwrap();

    let grant = stack
        .playback
        .issue_playback_grant(
            owner,
            stack.oracle.as_ref(),
            &PlaybackRequest {
                submission_id: record.submission_id,
                claimed_artifact_id: record.artifact_id,
                disposition: None,
            },
        )
        .await
        .unwrap();

    // The token binds this viewer and artifact and carries its own expiry.
    let issuer = HostedGrantIssuer::from_config(stack.config.hosted.as_ref().unwrap());
    let decoded = issuer.verify_grant(&grant.url_or_token, now).unwrap();
    assert_eq!(decoded.viewer_id, owner);
    assert_eq!(decoded.artifact_id, record.artifact_id);
    assert_eq!(decoded.expires_at, grant.expires_at);
}
