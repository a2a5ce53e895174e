//! Video store abstraction
//!
//! A `VideoStore` owns the remote side of an upload: reserving an artifact
//! identity before the first byte moves, accepting offset-ordered chunk
//! writes, answering processing-status polls, and deleting artifacts. Two
//! production backends exist (S3-compatible object storage and a hosted
//! video API) plus an in-memory backend for tests and local development.

pub mod factory;
pub mod hosted;
pub mod memory;
pub mod s3;
pub mod traits;

pub use factory::build_video_store;
pub use hosted::HostedVideoStore;
pub use memory::InMemoryVideoStore;
pub use s3::S3VideoStore;
pub use traits::{
    ProcessingReport, ProcessingState, ReservedUpload, StoreError, StoreResult, VideoStore,
};
