//! Canned-policy RSA-SHA1 signing.
//!
//! The policy document is serialized with a fixed field order and no
//! whitespace; the signature covers those exact bytes. The CDN expects its
//! own URL-safe alphabet: standard base64 first, then `+` -> `-`, `=` -> `_`,
//! `/` -> `~`, character by character. This is not base64url - the remap runs
//! after encoding, padding included.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::SigningError;

#[derive(Serialize)]
struct DateLessThan {
    #[serde(rename = "AWS:EpochTime")]
    epoch_time: i64,
}

#[derive(Serialize)]
struct Condition {
    #[serde(rename = "DateLessThan")]
    date_less_than: DateLessThan,
}

#[derive(Serialize)]
struct Statement<'a> {
    #[serde(rename = "Resource")]
    resource: &'a str,
    #[serde(rename = "Condition")]
    condition: Condition,
}

#[derive(Serialize)]
struct PolicyDocument<'a> {
    #[serde(rename = "Statement")]
    statement: [Statement<'a>; 1],
}

/// A fixed-shape access policy: one resource, one expiry condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedPolicy {
    pub resource: String,
    pub expires_at_epoch: i64,
}

impl CannedPolicy {
    pub fn new(resource: impl Into<String>, expires_at_epoch: i64) -> Self {
        Self {
            resource: resource.into(),
            expires_at_epoch,
        }
    }

    /// Deterministic serialization. serde_json emits no extraneous
    /// whitespace and leaves slashes unescaped, which is exactly what the
    /// CDN verifies against.
    pub fn to_json(&self) -> Result<String, SigningError> {
        let doc = PolicyDocument {
            statement: [Statement {
                resource: &self.resource,
                condition: Condition {
                    date_less_than: DateLessThan {
                        epoch_time: self.expires_at_epoch,
                    },
                },
            }],
        };
        serde_json::to_string(&doc).map_err(|e| SigningError::Sign(e.to_string()))
    }
}

/// Remap standard base64 output to the CDN's URL-safe alphabet.
fn cdn_safe_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .encode(data)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '=' => '_',
            '/' => '~',
            other => other,
        })
        .collect()
}

/// Undo the CDN alphabet remap and decode.
fn cdn_safe_decode(s: &str) -> Result<Vec<u8>, SigningError> {
    use base64::Engine;
    let standard: String = s
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '=',
            '~' => '/',
            other => other,
        })
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(standard)
        .map_err(|e| SigningError::Verify(e.to_string()))
}

/// RSA-SHA1 signer over canned policies. PKCS#1 v1.5 padding has no random
/// component, so output is deterministic for a given (policy, key).
#[derive(Debug)]
pub struct PolicySigner {
    key: RsaPrivateKey,
}

impl PolicySigner {
    /// Parse a PEM private key (PKCS#8 "PRIVATE KEY" or PKCS#1 "RSA PRIVATE
    /// KEY" framing).
    pub fn from_pem(pem: &str) -> Result<Self, SigningError> {
        let key = match RsaPrivateKey::from_pkcs8_pem(pem) {
            Ok(key) => key,
            Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                SigningError::Key(format!(
                    "not PKCS#8 ({}) nor PKCS#1 ({})",
                    pkcs8_err, pkcs1_err
                ))
            })?,
        };
        Ok(Self { key })
    }

    /// Sign the exact serialized policy bytes and encode for URL embedding.
    pub fn sign_policy(&self, policy: &CannedPolicy) -> Result<String, SigningError> {
        let json = policy.to_json()?;
        self.sign_bytes(json.as_bytes())
    }

    pub fn sign_bytes(&self, data: &[u8]) -> Result<String, SigningError> {
        let digest = Sha1::digest(data);
        let signature = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| SigningError::Sign(e.to_string()))?;
        Ok(cdn_safe_encode(&signature))
    }

    /// Verify an encoded signature against the signer's public half. Used by
    /// tests and by grant re-validation; the production verifier is the CDN
    /// edge.
    pub fn verify_bytes(&self, data: &[u8], encoded_signature: &str) -> Result<(), SigningError> {
        let signature = cdn_safe_decode(encoded_signature)?;
        let digest = Sha1::digest(data);
        let public: RsaPublicKey = self.key.to_public_key();
        public
            .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
            .map_err(|e| SigningError::Verify(e.to_string()))
    }
}
