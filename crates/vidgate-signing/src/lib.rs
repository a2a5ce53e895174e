//! Signed playback grants.
//!
//! Two signing schemes gate playback, one per storage backend:
//!
//! - **Canned policy** (S3 + CDN): a fixed-shape policy document (resource +
//!   expiry) is signed with RSA-SHA1 and appended to the resource URL as
//!   `Expires`/`Signature`/`Key-Pair-Id` query parameters. The CDN edge
//!   verifies the signature before serving a byte.
//! - **Bearer token** (hosted video API): an HMAC-SHA256 token binding the
//!   viewer, the artifact, and the expiry, passed as a query parameter.
//!
//! Both schemes are deterministic: signing the same inputs with the same key
//! yields byte-identical output.

pub mod issuer;
pub mod policy;
pub mod token;

pub use issuer::{CdnGrantIssuer, HostedGrantIssuer};
pub use policy::{CannedPolicy, PolicySigner};
pub use token::PlaybackToken;

use vidgate_core::AppError;

/// Signing failures. `Key` means the key material could not be parsed,
/// `Sign` that the primitive rejected the payload.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Key error: {0}")]
    Key(String),

    #[error("Sign error: {0}")]
    Sign(String),

    #[error("Verification failed: {0}")]
    Verify(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<SigningError> for AppError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::Key(msg) => AppError::KeyMaterial(msg),
            SigningError::Sign(msg) | SigningError::Verify(msg) => AppError::Signing(msg),
            SigningError::NotConfigured(msg) => AppError::NotConfigured(msg),
        }
    }
}
