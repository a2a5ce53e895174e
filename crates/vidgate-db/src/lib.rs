//! Persistence layer
//!
//! Repository traits for upload sessions, video records, and the shared
//! rate-limit counters, with Postgres implementations (runtime sqlx queries,
//! no DATABASE_URL needed at build time) and in-memory equivalents used by
//! tests and local development.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{InMemoryRateLimitRepository, InMemorySessionRepository, InMemoryVideoRecordRepository};
pub use postgres::{PgRateLimitRepository, PgSessionRepository, PgVideoRecordRepository};
pub use traits::{RateLimitRepository, SessionRepository, VideoRecordRepository};
