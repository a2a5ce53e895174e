use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A signed, time-bounded playback grant. Ephemeral: produced on demand and
/// carried only in the HTTP response, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignedGrant {
    /// Full signed URL (CDN backend) or opaque bearer token (hosted backend).
    pub url_or_token: String,
    /// Resource the signature covers, before the signature parameters.
    pub resource_path: String,
    pub expires_at: DateTime<Utc>,
    /// Key-pair identifier, present for the canned-policy scheme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}
