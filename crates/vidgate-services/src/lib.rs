//! Vidgate business services
//!
//! The upload session manager, the resumable chunk transport, the
//! retry/backoff controller, confirmation & reconciliation, playback grant
//! issuance, and the stale-upload reaper. Every service takes its
//! collaborators (repositories, video store, clock, sleeper) explicitly;
//! nothing here reads ambient state.

pub mod confirm;
pub mod playback;
pub mod reaper;
pub mod retry;
pub mod sessions;
pub mod time;
pub mod transport;

pub use confirm::ConfirmationService;
pub use playback::{PlaybackRequest, PlaybackService};
pub use reaper::StaleUploadReaper;
pub use retry::{run_with_retry, RetryError, RetryPolicy, Transience};
pub use sessions::UploadSessionService;
pub use time::{Clock, ManualClock, NoopSleeper, Sleeper, SystemClock, TokioSleeper};
pub use transport::ChunkTransport;

use vidgate_core::AppError;
use vidgate_storage::StoreError;

/// Map store errors into the application taxonomy. Offset conflicts are
/// mapped by the transport itself, which knows the expected offset; by the
/// time one reaches this function it is an internal inconsistency.
pub(crate) fn store_error_to_app(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound(msg) => AppError::NotFound(msg),
        StoreError::ConfigError(msg) => AppError::NotConfigured(msg),
        other => AppError::Store(other.to_string()),
    }
}

/// Fold a retry outcome into the application taxonomy, annotating exhausted
/// budgets.
pub(crate) fn retry_error_to_app(err: RetryError<StoreError>) -> AppError {
    if err.retries_exhausted {
        AppError::RetriesExhausted {
            attempts: err.attempts,
            last: Box::new(store_error_to_app(err.error)),
        }
    } else {
        store_error_to_app(err.error)
    }
}
