//! Vidgate Core Library
//!
//! This crate provides the domain models, error types, configuration, and the
//! access-decision logic shared across all Vidgate components.

pub mod access;
pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use access::{verify_access, AccessDecision, AccessFacts, AllowReason, CapabilityOracle, DenyReason, RecordFacts};
pub use config::{CdnConfig, Config, ConfirmConfig, HostedApiConfig, RateLimitConfig, ReaperConfig, RetryConfig, S3Config, ServerConfig, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::BackendKind;
