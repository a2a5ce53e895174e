mod helpers;

use bytes::Bytes;
use helpers::{stack, stack_with, test_config, upload_request, MIB};
use vidgate_core::models::{SessionStatus, TransportKind, VideoStatus};
use vidgate_core::AppError;
use vidgate_db::SessionRepository;

#[tokio::test]
async fn small_file_goes_direct_and_confirms_ready() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(10 * MIB))
        .await
        .unwrap();
    assert_eq!(session.transport, TransportKind::Direct);
    assert_eq!(session.bytes_confirmed, 0);
    assert_eq!(stack.session_service.suggested_chunk_count(&session), 1);

    // Direct transport: the whole file in one chunk at offset 0.
    let payload = Bytes::from(vec![7u8; (10 * MIB) as usize]);
    let confirmed = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, payload)
        .await
        .unwrap();
    assert_eq!(confirmed, 10 * MIB);

    let stored = stack.sessions.get(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);

    let record = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(record.status, VideoStatus::Ready);
    assert_eq!(record.file_size, Some(10 * MIB));
    assert_eq!(record.submission_id, session.submission_id);
}

#[tokio::test]
async fn large_file_selects_chunked_transport() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(500 * MIB))
        .await
        .unwrap();
    assert_eq!(session.transport, TransportKind::Chunked);
    // 500 MiB in 50 MiB chunks -> 10 chunks.
    assert_eq!(stack.session_service.suggested_chunk_count(&session), 10);
}

#[tokio::test]
async fn threshold_boundary_is_exclusive() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let below = stack
        .session_service
        .create_session(owner, upload_request(200 * MIB - 1))
        .await
        .unwrap();
    assert_eq!(below.transport, TransportKind::Direct);

    let at = stack
        .session_service
        .create_session(owner, upload_request(200 * MIB))
        .await
        .unwrap();
    assert_eq!(at.transport, TransportKind::Chunked);
}

#[tokio::test]
async fn chunked_upload_resumes_and_completes() {
    // Shrink the knobs so the test moves real bytes without moving many.
    let mut config = test_config();
    config.upload.direct_upload_threshold_bytes = MIB;
    config.upload.default_chunk_size_bytes = 256 * 1024;
    let stack = stack_with(config);
    let owner = uuid::Uuid::new_v4();

    let total = MIB;
    let chunk = 256 * 1024u64;
    let session = stack
        .session_service
        .create_session(owner, upload_request(total))
        .await
        .unwrap();
    assert_eq!(session.transport, TransportKind::Chunked);
    assert_eq!(stack.session_service.suggested_chunk_count(&session), 4);

    let mut confirmed = 0u64;
    for i in 0..2 {
        confirmed = stack
            .transport
            .accept_chunk(
                session.owner_id,
                session.id,
                i * chunk,
                Bytes::from(vec![i as u8; chunk as usize]),
            )
            .await
            .unwrap();
    }
    assert_eq!(confirmed, 2 * chunk);

    // The client drops and asks where to resume.
    assert_eq!(
        stack.transport.current_offset(session.owner_id, session.id).await.unwrap(),
        2 * chunk
    );

    for i in 2..4 {
        confirmed = stack
            .transport
            .accept_chunk(
                session.owner_id,
                session.id,
                i * chunk,
                Bytes::from(vec![i as u8; chunk as usize]),
            )
            .await
            .unwrap();
    }
    assert_eq!(confirmed, total);

    let record = stack
        .confirmation
        .confirm_upload(session.owner_id, session.id)
        .await
        .unwrap();
    assert_eq!(record.status, VideoStatus::Ready);
    assert_eq!(record.file_size, Some(total));

    // The store holds exactly the bytes sent, in order.
    let bytes = stack.store.artifact_bytes(session.artifact_id).unwrap();
    assert_eq!(bytes.len() as u64, total);
    assert_eq!(bytes[0], 0);
    assert_eq!(bytes[(chunk * 3) as usize], 3);
}

#[tokio::test]
async fn offset_gaps_and_overlaps_are_rejected() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(1000))
        .await
        .unwrap();

    stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, Bytes::from(vec![0u8; 400]))
        .await
        .unwrap();

    // Gap: confirmed is 400, client claims 500.
    let gap = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 500, Bytes::from(vec![0u8; 100]))
        .await
        .unwrap_err();
    assert!(matches!(
        gap,
        AppError::OffsetMismatch {
            expected: 400,
            got: 500
        }
    ));

    // Overlap: client re-sends from 300.
    let overlap = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 300, Bytes::from(vec![0u8; 100]))
        .await
        .unwrap_err();
    assert!(matches!(
        overlap,
        AppError::OffsetMismatch {
            expected: 400,
            got: 300
        }
    ));

    // Exact match succeeds and finishes the file.
    let confirmed = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 400, Bytes::from(vec![0u8; 600]))
        .await
        .unwrap();
    assert_eq!(confirmed, 1000);
}

#[tokio::test]
async fn chunk_past_declared_size_is_rejected() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(1000))
        .await
        .unwrap();

    let err = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, Bytes::from(vec![0u8; 1001]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    // Nothing was confirmed by the failed write.
    assert_eq!(stack.transport.current_offset(session.owner_id, session.id).await.unwrap(), 0);
}

#[tokio::test]
async fn transient_store_failures_are_retried_transparently() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(1000))
        .await
        .unwrap();

    // Two connection resets, then success; the data budget is 5 attempts.
    stack.store.fail_next_writes(2);
    let confirmed = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, Bytes::from(vec![0u8; 1000]))
        .await
        .unwrap();
    assert_eq!(confirmed, 1000);
    // Two backoff sleeps were requested (1s, then 2s pre-jitter).
    let slept = stack.sleeper.slept();
    assert_eq!(slept.len(), 2);
    assert!(slept[0].as_millis() >= 1000);
    assert!(slept[1].as_millis() >= 2000);
}

#[tokio::test]
async fn exhausted_retry_budget_surfaces_annotated_error() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(1000))
        .await
        .unwrap();

    stack.store.fail_next_writes(100);
    let err = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, Bytes::from(vec![0u8; 1000]))
        .await
        .unwrap_err();
    match err {
        AppError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 5),
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }

    // The session still resumes from 0 once the backend recovers.
    stack.store.fail_next_writes(0);
    assert_eq!(stack.transport.current_offset(session.owner_id, session.id).await.unwrap(), 0);
}

#[tokio::test]
async fn expired_session_rejects_chunks() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(1000))
        .await
        .unwrap();

    stack.clock.advance(chrono::Duration::hours(2));

    let err = stack
        .transport
        .accept_chunk(session.owner_id, session.id, 0, Bytes::from(vec![0u8; 1000]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SessionExpired(_)));
}

#[tokio::test]
async fn only_the_owner_may_drive_the_session() {
    let stack = stack();
    let owner = uuid::Uuid::new_v4();
    let intruder = uuid::Uuid::new_v4();

    let session = stack
        .session_service
        .create_session(owner, upload_request(1000))
        .await
        .unwrap();

    let err = stack
        .transport
        .accept_chunk(intruder, session.id, 0, Bytes::from(vec![0u8; 100]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied { .. }));

    let err = stack
        .transport
        .current_offset(intruder, session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccessDenied { .. }));
}
