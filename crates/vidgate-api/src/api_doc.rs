//! OpenAPI documentation.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vidgate API",
        description = "Resumable video submission uploads and signed playback grants"
    ),
    paths(
        crate::handlers::sessions::create_upload_session,
        crate::handlers::sessions::cleanup_session,
        crate::handlers::chunks::upload_chunk,
        crate::handlers::chunks::current_offset,
        crate::handlers::confirm::confirm_upload,
        crate::handlers::playback::issue_playback_grant,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::handlers::sessions::CreateSessionResponse,
        crate::handlers::chunks::OffsetResponse,
        crate::handlers::playback::PlaybackGrantResponse,
        vidgate_core::models::NewUploadSession,
        vidgate_core::models::VideoRecordResponse,
        vidgate_core::models::TransportKind,
        vidgate_core::models::VideoStatus,
    )),
    tags(
        (name = "uploads", description = "Upload session and transport operations"),
        (name = "videos", description = "Playback grant operations")
    )
)]
pub struct ApiDoc;
