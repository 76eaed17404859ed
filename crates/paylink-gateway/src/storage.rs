//! Object-storage URL signing for file routes.
//!
//! The gateway never streams file bytes itself. It hands out short-lived
//! presigned URLs against an S3-compatible store (AWS S3, Cloudflare R2,
//! MinIO).

use rusty_s3::{Bucket, Credentials, S3Action, UrlStyle};
use std::time::Duration;
use time::OffsetDateTime;
use url::Url;

use crate::config::StorageConfig;
use crate::error::GatewayError;

/// SigV4 presigned URLs are valid for at most seven days.
const MAX_EXPIRES_SECS: u64 = 7 * 24 * 60 * 60;

/// Given a key, produce a time-boxed URL.
pub trait UrlSigner: Send + Sync {
    fn presign_upload(&self, key: &str, ttl: Duration) -> Result<String, GatewayError>;

    /// `filename`, when given, is sent back as an attachment disposition.
    fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        filename: Option<&str>,
    ) -> Result<String, GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

pub struct S3Presigner {
    bucket: Bucket,
    credentials: Credentials,
}

impl std::fmt::Debug for S3Presigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Presigner")
            .field("base_url", &self.bucket.base_url().as_str())
            .field("bucket", &self.bucket.name())
            .field("region", &self.bucket.region())
            .finish()
    }
}

impl S3Presigner {
    /// Path-style addressing (`https://endpoint/bucket/key`), which every
    /// S3-compatible store accepts.
    pub fn new(config: &StorageConfig) -> Result<Self, GatewayError> {
        Self::with_url_style(config, UrlStyle::Path)
    }

    pub fn with_url_style(config: &StorageConfig, style: UrlStyle) -> Result<Self, GatewayError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| GatewayError::Storage(format!("invalid storage endpoint: {e}")))?;
        let bucket = Bucket::new(
            endpoint,
            style,
            config.bucket.clone(),
            config.region.clone(),
        )
        .map_err(|e| GatewayError::Storage(format!("invalid bucket: {e}")))?;

        Ok(Self {
            bucket,
            credentials: Credentials::new(config.access_key.clone(), config.secret_key.clone()),
        })
    }

    pub(crate) fn presign_at(
        &self,
        access: Access,
        key: &str,
        ttl: Duration,
        filename: Option<&str>,
        now: &OffsetDateTime,
    ) -> Result<String, GatewayError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(GatewayError::Storage("empty object key".to_string()));
        }
        let expires_in = Duration::from_secs(ttl.as_secs().clamp(1, MAX_EXPIRES_SECS));

        let url = match access {
            Access::Write => self
                .bucket
                .put_object(Some(&self.credentials), key)
                .sign_with_time(expires_in, now),
            Access::Read => {
                let mut action = self.bucket.get_object(Some(&self.credentials), key);
                if let Some(name) = filename {
                    action
                        .query_mut()
                        .insert("response-content-disposition", content_disposition(name));
                }
                action.sign_with_time(expires_in, now)
            }
        };
        Ok(url.into())
    }
}

impl UrlSigner for S3Presigner {
    fn presign_upload(&self, key: &str, ttl: Duration) -> Result<String, GatewayError> {
        self.presign_at(Access::Write, key, ttl, None, &OffsetDateTime::now_utc())
    }

    fn presign_download(
        &self,
        key: &str,
        ttl: Duration,
        filename: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.presign_at(Access::Read, key, ttl, filename, &OffsetDateTime::now_utc())
    }
}

pub fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' | '\r' | '\n' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}
