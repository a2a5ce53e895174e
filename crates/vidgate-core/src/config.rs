//! Configuration module
//!
//! One validated `Config` is constructed from the environment at startup and
//! passed down explicitly; no component reads ambient state. Malformed
//! thresholds fail here, at construction. Key material for a backend may be
//! absent - issuing a grant against that backend then fails with
//! `NotConfigured` instead of failing startup.

use std::env;

use crate::storage_types::BackendKind;

// Defaults
const DIRECT_UPLOAD_THRESHOLD_BYTES: u64 = 200 * 1024 * 1024;
const MAX_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024 * 1024;
const DEFAULT_CHUNK_SIZE_BYTES: u64 = 50 * 1024 * 1024;
const SESSION_DEADLINE_SECS: i64 = 3600;
const GRANT_TTL_SECS: u64 = 3600;
const RETRY_BASE_DELAY_MS: u64 = 1000;
const RETRY_MULTIPLIER: f64 = 2.0;
const RETRY_MAX_DELAY_MS: u64 = 30_000;
const RETRY_CONTROL_MAX_ATTEMPTS: u32 = 3;
const RETRY_DATA_MAX_ATTEMPTS: u32 = 5;
const CONFIRM_RECHECK_INTERVAL_SECS: i64 = 60;
const REAPER_SWEEP_INTERVAL_SECS: u64 = 300;
const UPLOAD_SLOTS_PER_HOUR: u32 = 30;
const PLAYBACK_GRANTS_PER_HOUR: u32 = 120;

/// Server-level settings consumed by the API binary.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

/// Upload slot limits and transport selection.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Hard ceiling; larger requests fail with QuotaExceeded.
    pub max_file_size_bytes: u64,
    /// Below this, one direct PUT; at or above it, chunked resumable.
    pub direct_upload_threshold_bytes: u64,
    /// Suggested chunk size returned to clients; they may send smaller.
    pub default_chunk_size_bytes: u64,
    pub session_deadline_secs: i64,
    pub allowed_content_types: Vec<String>,
}

/// Exponential backoff settings for the retry controller.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Budget for control-plane calls (reserve, delete, status).
    pub control_max_attempts: u32,
    /// Budget for data-plane calls (chunk writes).
    pub data_max_attempts: u32,
}

/// Confirmation polling schedule.
#[derive(Clone, Debug)]
pub struct ConfirmConfig {
    /// Delays between processing-status polls, in seconds.
    pub poll_delays_secs: Vec<u64>,
    /// Minimum interval before a record in `uploading` is re-polled.
    pub recheck_interval_secs: i64,
}

impl ConfirmConfig {
    pub fn max_attempts(&self) -> usize {
        self.poll_delays_secs.len()
    }
}

/// Stale-upload reaper settings.
#[derive(Clone, Debug)]
pub struct ReaperConfig {
    pub sweep_interval_secs: u64,
}

/// Per-user, per-operation hourly request caps.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub upload_slots_per_hour: u32,
    pub playback_grants_per_hour: u32,
}

/// S3-compatible object storage settings.
#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, R2).
    pub endpoint_url: Option<String>,
}

/// CDN canned-policy signing material (S3 backend playback).
#[derive(Clone, Debug)]
pub struct CdnConfig {
    /// e.g. "https://dXXXX.cloudfront.net"
    pub base_url: String,
    pub key_pair_id: String,
    pub private_key_pem: String,
}

/// Hosted video API settings (reservation, transport, status, tokens).
#[derive(Clone, Debug)]
pub struct HostedApiConfig {
    pub api_base_url: String,
    pub api_token: String,
    /// Secret for the HMAC bearer playback token.
    pub token_secret: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendKind,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub confirm: ConfirmConfig,
    pub reaper: ReaperConfig,
    pub rate_limit: RateLimitConfig,
    pub grant_ttl_secs: u64,
    pub s3: Option<S3Config>,
    pub cdn: Option<CdnConfig>,
    pub hosted: Option<HostedApiConfig>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let backend = env::var("VIDEO_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<BackendKind>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let allowed_content_types = env::var("VIDEO_ALLOWED_CONTENT_TYPES")
            .unwrap_or_else(|_| "video/mp4,video/webm,video/quicktime,video/x-matroska".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .collect();

        let poll_delays_secs: Vec<u64> = env::var("CONFIRM_POLL_DELAYS_SECS")
            .unwrap_or_else(|_| "5,10,15,15,15".to_string())
            .split(',')
            .map(|s| {
                s.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("CONFIRM_POLL_DELAYS_SECS must be a comma-separated list of seconds"))
            })
            .collect::<Result<_, _>>()?;

        let config = Config {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "4000".to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
                cors_origins,
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
                environment,
                database_url: env_opt("DATABASE_URL"),
                db_max_connections: env_u32("DB_MAX_CONNECTIONS", 20),
            },
            backend,
            upload: UploadConfig {
                max_file_size_bytes: env_u64("MAX_FILE_SIZE_BYTES", MAX_FILE_SIZE_BYTES),
                direct_upload_threshold_bytes: env_u64(
                    "DIRECT_UPLOAD_THRESHOLD_BYTES",
                    DIRECT_UPLOAD_THRESHOLD_BYTES,
                ),
                default_chunk_size_bytes: env_u64(
                    "DEFAULT_CHUNK_SIZE_BYTES",
                    DEFAULT_CHUNK_SIZE_BYTES,
                ),
                session_deadline_secs: env_i64("SESSION_DEADLINE_SECS", SESSION_DEADLINE_SECS),
                allowed_content_types,
            },
            retry: RetryConfig {
                base_delay_ms: env_u64("RETRY_BASE_DELAY_MS", RETRY_BASE_DELAY_MS),
                multiplier: env::var("RETRY_MULTIPLIER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(RETRY_MULTIPLIER),
                max_delay_ms: env_u64("RETRY_MAX_DELAY_MS", RETRY_MAX_DELAY_MS),
                control_max_attempts: env_u32(
                    "RETRY_CONTROL_MAX_ATTEMPTS",
                    RETRY_CONTROL_MAX_ATTEMPTS,
                ),
                data_max_attempts: env_u32("RETRY_DATA_MAX_ATTEMPTS", RETRY_DATA_MAX_ATTEMPTS),
            },
            confirm: ConfirmConfig {
                poll_delays_secs,
                recheck_interval_secs: env_i64(
                    "CONFIRM_RECHECK_INTERVAL_SECS",
                    CONFIRM_RECHECK_INTERVAL_SECS,
                ),
            },
            reaper: ReaperConfig {
                sweep_interval_secs: env_u64(
                    "REAPER_SWEEP_INTERVAL_SECS",
                    REAPER_SWEEP_INTERVAL_SECS,
                ),
            },
            rate_limit: RateLimitConfig {
                upload_slots_per_hour: env_u32("UPLOAD_SLOTS_PER_HOUR", UPLOAD_SLOTS_PER_HOUR),
                playback_grants_per_hour: env_u32(
                    "PLAYBACK_GRANTS_PER_HOUR",
                    PLAYBACK_GRANTS_PER_HOUR,
                ),
            },
            grant_ttl_secs: env_u64("GRANT_TTL_SECS", GRANT_TTL_SECS),
            s3: match (env_opt("S3_BUCKET"), env_opt("S3_REGION")) {
                (Some(bucket), Some(region)) => Some(S3Config {
                    bucket,
                    region,
                    endpoint_url: env_opt("S3_ENDPOINT"),
                }),
                _ => None,
            },
            cdn: match (
                env_opt("CDN_BASE_URL"),
                env_opt("CDN_KEY_PAIR_ID"),
                env_opt("CDN_PRIVATE_KEY_PEM"),
            ) {
                (Some(base_url), Some(key_pair_id), Some(private_key_pem)) => Some(CdnConfig {
                    base_url,
                    key_pair_id,
                    private_key_pem,
                }),
                _ => None,
            },
            hosted: match (
                env_opt("HOSTED_API_BASE_URL"),
                env_opt("HOSTED_API_TOKEN"),
                env_opt("HOSTED_TOKEN_SECRET"),
            ) {
                (Some(api_base_url), Some(api_token), Some(token_secret)) => {
                    Some(HostedApiConfig {
                        api_base_url,
                        api_token,
                        token_secret,
                    })
                }
                _ => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if self.upload.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_BYTES must be greater than 0"));
        }
        if self.upload.direct_upload_threshold_bytes == 0 {
            return Err(anyhow::anyhow!(
                "DIRECT_UPLOAD_THRESHOLD_BYTES must be greater than 0"
            ));
        }
        if self.upload.default_chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "DEFAULT_CHUNK_SIZE_BYTES must be greater than 0"
            ));
        }
        if self.upload.session_deadline_secs <= 0 {
            return Err(anyhow::anyhow!("SESSION_DEADLINE_SECS must be positive"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(anyhow::anyhow!("RETRY_MULTIPLIER must be at least 1.0"));
        }
        if self.confirm.poll_delays_secs.is_empty() {
            return Err(anyhow::anyhow!(
                "CONFIRM_POLL_DELAYS_SECS must contain at least one delay"
            ));
        }
        // A grant must expire strictly in the future at issuance time.
        if self.grant_ttl_secs == 0 {
            return Err(anyhow::anyhow!("GRANT_TTL_SECS must be greater than 0"));
        }

        match self.backend {
            BackendKind::S3 => {
                if self.s3.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET and S3_REGION must be set when using the S3 video backend"
                    ));
                }
            }
            BackendKind::Hosted => {
                if self.hosted.is_none() {
                    return Err(anyhow::anyhow!(
                        "HOSTED_API_BASE_URL, HOSTED_API_TOKEN and HOSTED_TOKEN_SECRET must be set when using the hosted video backend"
                    ));
                }
            }
            BackendKind::Memory => {}
        }

        if let Some(ref cdn) = self.cdn {
            if !cdn.private_key_pem.contains("BEGIN") {
                return Err(anyhow::anyhow!(
                    "CDN_PRIVATE_KEY_PEM does not look like a PEM-encoded key"
                ));
            }
        }

        Ok(())
    }

    /// Test/dev configuration over the in-memory backend. Not read from the
    /// environment.
    pub fn for_tests() -> Self {
        Config {
            server: ServerConfig {
                port: 0,
                cors_origins: vec!["*".to_string()],
                jwt_secret: "test-secret-test-secret-test-secret!".to_string(),
                environment: "test".to_string(),
                database_url: None,
                db_max_connections: 1,
            },
            backend: BackendKind::Memory,
            upload: UploadConfig {
                max_file_size_bytes: MAX_FILE_SIZE_BYTES,
                direct_upload_threshold_bytes: DIRECT_UPLOAD_THRESHOLD_BYTES,
                default_chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
                session_deadline_secs: SESSION_DEADLINE_SECS,
                allowed_content_types: vec!["video/mp4".to_string(), "video/webm".to_string()],
            },
            retry: RetryConfig {
                base_delay_ms: RETRY_BASE_DELAY_MS,
                multiplier: RETRY_MULTIPLIER,
                max_delay_ms: RETRY_MAX_DELAY_MS,
                control_max_attempts: RETRY_CONTROL_MAX_ATTEMPTS,
                data_max_attempts: RETRY_DATA_MAX_ATTEMPTS,
            },
            confirm: ConfirmConfig {
                poll_delays_secs: vec![5, 10, 15, 15, 15],
                recheck_interval_secs: CONFIRM_RECHECK_INTERVAL_SECS,
            },
            reaper: ReaperConfig {
                sweep_interval_secs: REAPER_SWEEP_INTERVAL_SECS,
            },
            rate_limit: RateLimitConfig {
                upload_slots_per_hour: UPLOAD_SLOTS_PER_HOUR,
                playback_grants_per_hour: PLAYBACK_GRANTS_PER_HOUR,
            },
            grant_ttl_secs: GRANT_TTL_SECS,
            s3: None,
            cdn: None,
            hosted: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validates() {
        let config = Config::for_tests();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn short_jwt_secret_rejected() {
        let mut config = Config::for_tests();
        config.server.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut config = Config::for_tests();
        config.upload.default_chunk_size_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let mut config = Config::for_tests();
        config.backend = BackendKind::S3;
        assert!(config.validate().is_err());

        config.s3 = Some(S3Config {
            bucket: "videos".to_string(),
            region: "eu-west-1".to_string(),
            endpoint_url: None,
        });
        assert!(config.validate().is_ok());
    }
}
