//! Bearer playback token for the hosted video backend.
//!
//! Payload: expiry_ts (u64 BE) || viewer_id (16 bytes) || artifact_id (16
//! bytes) = 40 bytes. Token = base64url(payload || HMAC-SHA256(secret,
//! payload)). The expiry rides inside the token so the issuer can check
//! validity without a server round trip.

use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::SigningError;

const PAYLOAD_LEN: usize = 8 + 16 + 16; // expiry + viewer_id + artifact_id
const MAC_LEN: usize = 32; // SHA256
const TOKEN_LEN: usize = PAYLOAD_LEN + MAC_LEN;

/// Decoded contents of a verified playback token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackToken {
    pub viewer_id: Uuid,
    pub artifact_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Build a signed playback token.
pub fn create(
    viewer_id: Uuid,
    artifact_id: Uuid,
    expires_at: DateTime<Utc>,
    secret: &[u8],
) -> Result<String, SigningError> {
    let expiry_ts = u64::try_from(expires_at.timestamp())
        .map_err(|_| SigningError::Sign("expiry predates the epoch".to_string()))?;

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0..8].copy_from_slice(&expiry_ts.to_be_bytes());
    payload[8..24].copy_from_slice(viewer_id.as_bytes());
    payload[24..40].copy_from_slice(artifact_id.as_bytes());

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| SigningError::Key(e.to_string()))?;
    mac.update(&payload);
    let tag = mac.finalize().into_bytes();

    let mut token_bytes = [0u8; TOKEN_LEN];
    token_bytes[0..PAYLOAD_LEN].copy_from_slice(&payload);
    token_bytes[PAYLOAD_LEN..].copy_from_slice(&tag);

    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes))
}

/// Verify a token's tag and expiry at `now`, returning its contents.
pub fn verify(token: &str, now: DateTime<Utc>, secret: &[u8]) -> Result<PlaybackToken, SigningError> {
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| SigningError::Verify("Invalid playback token".to_string()))?;
    if decoded.len() != TOKEN_LEN {
        return Err(SigningError::Verify("Invalid playback token".to_string()));
    }

    let (payload, tag) = decoded.split_at(PAYLOAD_LEN);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| SigningError::Key(e.to_string()))?;
    mac.update(payload);
    mac.verify_slice(tag)
        .map_err(|_| SigningError::Verify("Invalid playback token".to_string()))?;

    let expiry_ts = u64::from_be_bytes(payload[0..8].try_into().expect("fixed-width slice"));
    let expires_at = Utc
        .timestamp_opt(expiry_ts as i64, 0)
        .single()
        .ok_or_else(|| SigningError::Verify("Invalid playback token".to_string()))?;
    if now >= expires_at {
        return Err(SigningError::Verify(
            "Playback token has expired".to_string(),
        ));
    }

    let viewer_id = Uuid::from_bytes(payload[8..24].try_into().expect("fixed-width slice"));
    let artifact_id = Uuid::from_bytes(payload[24..40].try_into().expect("fixed-width slice"));

    Ok(PlaybackToken {
        viewer_id,
        artifact_id,
        expires_at,
    })
}
