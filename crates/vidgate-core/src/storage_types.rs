use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Video storage backend kind.
///
/// `S3` stores artifacts in S3-compatible object storage fronted by a CDN
/// (playback through canned-policy signed URLs). `Hosted` delegates storage
/// and transcoding to an external video-hosting API (playback through bearer
/// tokens). `Memory` is the in-process backend used by tests and local
/// development.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    S3,
    Hosted,
    Memory,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BackendKind::S3 => write!(f, "s3"),
            BackendKind::Hosted => write!(f, "hosted"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(BackendKind::S3),
            "hosted" => Ok(BackendKind::Hosted),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("Unknown storage backend: {}", other)),
        }
    }
}
