mod helpers;

use bytes::Bytes;
use helpers::{stack, upload_request, MIB};
use std::time::Duration;
use vidgate_core::models::VideoStatus;
use vidgate_core::AppError;
use vidgate_db::SessionRepository;
use vidgate_storage::VideoStore;

/// Create a session and push all its bytes through the transport.
async fn completed_session(stack: &helpers::TestStack) -> vidgate_core::models::UploadSession {
    let owner = uuid::Uuid::new_v4();
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
    stack.sessions.get(session.id).await.unwrap().unwrap()
}

#[tokio::test]
async fn confirm_is_idempotent() {
    let stack = stack();
    let session = completed_session(&stack).await;

    let first = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(first.status, VideoStatus::Ready);
    assert_eq!(stack.records.len(), 1);

    let polls_after_first = stack.store.status_calls();

    let second = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, VideoStatus::Ready);
    assert_eq!(second.file_size, first.file_size);
    // Still one record, and the terminal fast path made no backend call.
    assert_eq!(stack.records.len(), 1);
    assert_eq!(stack.store.status_calls(), polls_after_first);
}

#[tokio::test]
async fn confirm_polls_on_the_configured_schedule() {
    let stack = stack();
    let session = completed_session(&stack).await;

    // The backend needs three polls before it reports ready.
    stack.store.set_polls_until_ready(session.artifact_id, 2);

    let record = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(record.status, VideoStatus::Ready);

    // Immediate poll (processing), sleep 5s, poll (processing), sleep 10s,
    // poll (ready).
    let slept = stack.sleeper.slept();
    assert_eq!(
        slept,
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn still_processing_after_budget_leaves_record_uploading() {
    let stack = stack();
    let session = completed_session(&stack).await;

    stack.store.set_polls_until_ready(session.artifact_id, 100);

    let record = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(record.status, VideoStatus::Uploading);
    // Full schedule consumed: 5/10/15/15/15.
    assert_eq!(
        stack.sleeper.slept(),
        vec![
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(15),
            Duration::from_secs(15),
            Duration::from_secs(15),
        ]
    );

    // An immediate re-confirm is gated by the 60s re-check interval and
    // does not poll again.
    let polls = stack.store.status_calls();
    let again = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(again.status, VideoStatus::Uploading);
    assert_eq!(stack.store.status_calls(), polls);

    // Past the gate the poll resumes and can promote to ready.
    stack.clock.advance(chrono::Duration::seconds(61));
    stack.store.set_polls_until_ready(session.artifact_id, 0);
    let promoted = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(promoted.status, VideoStatus::Ready);
    assert_eq!(stack.records.len(), 1);
}

#[tokio::test]
async fn missing_artifact_marks_record_deleted() {
    let stack = stack();
    let session = completed_session(&stack).await;

    // The backend lost the artifact between completion and confirmation.
    stack
        .store
        .delete_artifact(session.artifact_id)
        .await
        .unwrap();

    let record = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(record.status, VideoStatus::Deleted);
    assert!(record.deleted_at.is_some());
}

#[tokio::test]
async fn confirm_of_incomplete_session_is_invalid() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();
    let session = stack
        .session_service
        .create_session(owner, upload_request(MIB))
        .await
        .unwrap();

    let err = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = stack
        .confirmation
        .confirm_upload(uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn ready_duration_is_carried_from_the_backend() {
    let stack = stack();
    let session = completed_session(&stack).await;
    stack.store.set_duration(session.artifact_id, 182.5);

    let record = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(record.status, VideoStatus::Ready);
    assert_eq!(record.duration, Some(182.5));
}
