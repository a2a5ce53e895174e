//! Grant issuance: assembles the final signed URL or token.
//!
//! The correctness-critical rule for the CDN scheme: the full target URL,
//! including every query parameter the client will send, is computed FIRST
//! and that exact string is signed. Appending a parameter after signing
//! produces a grant the CDN edge rejects.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use vidgate_core::models::SignedGrant;
use vidgate_core::{CdnConfig, HostedApiConfig};

use crate::policy::{CannedPolicy, PolicySigner};
use crate::{token, SigningError};

/// Issues canned-policy signed URLs for CDN playback.
pub struct CdnGrantIssuer {
    base_url: String,
    key_pair_id: String,
    signer: PolicySigner,
}

impl CdnGrantIssuer {
    pub fn from_config(config: &CdnConfig) -> Result<Self, SigningError> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_pair_id: config.key_pair_id.clone(),
            signer: PolicySigner::from_pem(&config.private_key_pem)?,
        })
    }

    /// Sign a playback URL for `resource_path`, valid until `expires_at`.
    ///
    /// A `response-content-disposition` override becomes part of the signed
    /// resource, never an afterthought.
    pub fn issue(
        &self,
        resource_path: &str,
        expires_at: DateTime<Utc>,
        disposition: Option<&str>,
    ) -> Result<SignedGrant, SigningError> {
        let mut resource = format!(
            "{}/{}",
            self.base_url,
            resource_path.trim_start_matches('/')
        );
        if let Some(disposition) = disposition {
            resource.push_str("?response-content-disposition=");
            resource.push_str(&urlencoding::encode(disposition));
        }

        let policy = CannedPolicy::new(resource.clone(), expires_at.timestamp());
        let signature = self.signer.sign_policy(&policy)?;

        let separator = if resource.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}Expires={}&Signature={}&Key-Pair-Id={}",
            resource,
            separator,
            expires_at.timestamp(),
            signature,
            self.key_pair_id
        );

        Ok(SignedGrant {
            url_or_token: url,
            resource_path: resource,
            expires_at,
            key_id: Some(self.key_pair_id.clone()),
        })
    }

    /// Re-validate a previously issued URL against the same key: the
    /// signature must cover the exact resource string and `now` must be
    /// before the embedded expiry. The production verifier is the CDN edge;
    /// this mirrors its checks for tests and diagnostics.
    pub fn verify_grant(&self, url: &str, now: DateTime<Utc>) -> Result<(), SigningError> {
        let marker = if let Some(idx) = url.find("?Expires=") {
            idx
        } else if let Some(idx) = url.find("&Expires=") {
            idx
        } else {
            return Err(SigningError::Verify(
                "URL carries no Expires parameter".to_string(),
            ));
        };

        let (resource, params) = url.split_at(marker);
        let mut expires: Option<i64> = None;
        let mut signature: Option<&str> = None;
        for pair in params[1..].split('&') {
            match pair.split_once('=') {
                Some(("Expires", v)) => {
                    expires = v.parse().ok();
                }
                Some(("Signature", v)) => signature = Some(v),
                _ => {}
            }
        }
        let expires = expires
            .ok_or_else(|| SigningError::Verify("Malformed Expires parameter".to_string()))?;
        let signature = signature
            .ok_or_else(|| SigningError::Verify("URL carries no Signature parameter".to_string()))?;

        if now.timestamp() >= expires {
            return Err(SigningError::Verify("Grant has expired".to_string()));
        }

        let policy = CannedPolicy::new(resource, expires);
        self.signer
            .verify_bytes(policy.to_json()?.as_bytes(), signature)
    }
}

/// Issues bearer playback tokens for the hosted video backend.
pub struct HostedGrantIssuer {
    secret: Vec<u8>,
}

impl HostedGrantIssuer {
    pub fn from_config(config: &HostedApiConfig) -> Self {
        Self {
            secret: config.token_secret.as_bytes().to_vec(),
        }
    }

    pub fn issue(
        &self,
        viewer_id: Uuid,
        artifact_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<SignedGrant, SigningError> {
        let token = token::create(viewer_id, artifact_id, expires_at, &self.secret)?;
        Ok(SignedGrant {
            url_or_token: token,
            resource_path: artifact_id.to_string(),
            expires_at,
            key_id: None,
        })
    }

    pub fn verify_grant(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<token::PlaybackToken, SigningError> {
        token::verify(token, now, &self.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cdn_issuer() -> CdnGrantIssuer {
        CdnGrantIssuer::from_config(&CdnConfig {
            base_url: "https://cdn.example.edu/".to_string(),
            key_pair_id: "APKTESTKEYPAIR".to_string(),
            private_key_pem: include_str!("testdata/cdn_test_key.pem").to_string(),
        })
        .unwrap()
    }

    fn expiry() -> DateTime<Utc> {
        Utc.timestamp_opt(1893456000, 0).single().unwrap()
    }

    #[test]
    fn issued_url_has_the_expected_shape() {
        let grant = cdn_issuer()
            .issue("videos/a1b2c3.mp4", expiry(), None)
            .unwrap();
        assert!(grant
            .url_or_token
            .starts_with("https://cdn.example.edu/videos/a1b2c3.mp4?Expires=1893456000&Signature="));
        assert!(grant.url_or_token.ends_with("&Key-Pair-Id=APKTESTKEYPAIR"));
        assert_eq!(grant.key_id.as_deref(), Some("APKTESTKEYPAIR"));
        assert_eq!(grant.expires_at, expiry());
    }

    #[test]
    fn issued_url_verifies_until_expiry() {
        let issuer = cdn_issuer();
        let grant = issuer.issue("videos/a1b2c3.mp4", expiry(), None).unwrap();

        let before = Utc.timestamp_opt(1893455999, 0).single().unwrap();
        let at = expiry();
        assert!(issuer.verify_grant(&grant.url_or_token, before).is_ok());
        assert!(issuer.verify_grant(&grant.url_or_token, at).is_err());
    }

    #[test]
    fn disposition_is_signed_into_the_resource() {
        let issuer = cdn_issuer();
        let grant = issuer
            .issue(
                "videos/a1b2c3.mp4",
                expiry(),
                Some("attachment; filename=\"lecture.mp4\""),
            )
            .unwrap();

        // The disposition parameter precedes the signature parameters, so
        // the signature covers it.
        assert!(grant
            .url_or_token
            .contains("?response-content-disposition="));
        assert!(grant.url_or_token.contains("&Expires="));
        let before = Utc.timestamp_opt(1893455999, 0).single().unwrap();
        assert!(issuer.verify_grant(&grant.url_or_token, before).is_ok());
    }

    #[test]
    fn appending_a_parameter_after_signing_breaks_the_grant() {
        let issuer = cdn_issuer();
        let grant = issuer.issue("videos/a1b2c3.mp4", expiry(), None).unwrap();
        let before = Utc.timestamp_opt(1893455999, 0).single().unwrap();

        // Simulate the broken append-after approach: the edge rebuilds the
        // resource including the extra parameter and the signature no longer
        // matches.
        let tampered = grant
            .url_or_token
            .replace("?Expires=", "?response-content-disposition=attachment&Expires=");
        assert!(issuer.verify_grant(&tampered, before).is_err());
    }

    #[test]
    fn hosted_tokens_round_trip() {
        let issuer = HostedGrantIssuer::from_config(&HostedApiConfig {
            api_base_url: "https://video.example.com/api".to_string(),
            api_token: "svc-token".to_string(),
            token_secret: "a-very-long-token-secret-for-tests".to_string(),
        });
        let viewer = Uuid::new_v4();
        let artifact = Uuid::new_v4();
        let now = Utc::now();
        let grant = issuer
            .issue(viewer, artifact, now + chrono::Duration::seconds(3600))
            .unwrap();

        let decoded = issuer.verify_grant(&grant.url_or_token, now).unwrap();
        assert_eq!(decoded.viewer_id, viewer);
        assert_eq!(decoded.artifact_id, artifact);
    }
}
