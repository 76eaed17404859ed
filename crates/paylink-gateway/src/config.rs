use alloy::primitives::Address;
use paylink::{DEFAULT_FACILITATOR_URL, DEFAULT_MAX_TIMEOUT_SECONDS};
use std::env;
use url::Url;

const DEFAULT_PORT: u16 = 4402;
const DEFAULT_DB_PATH: &str = "./paylink.db";
const DEFAULT_RATE_LIMIT_RPM: u32 = 120;
const DEFAULT_SUBSCRIPTION_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_DOWNLOAD_URL_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_STORAGE_REGION: &str = "auto";

/// S3-compatible object store holding file-route payloads.
#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    /// Default payee when a route's owner has no payment address
    pub payment_address: Address,
    /// Facilitator base URL (`/verify` and `/settle` are appended)
    pub facilitator_url: String,
    /// HMAC shared secret for facilitator auth (None = unsigned requests)
    pub hmac_secret: Option<Vec<u8>>,
    /// SQLite database path
    pub db_path: String,
    /// Server port
    pub port: u16,
    /// Public scheme://host used to build resource URLs. Falls back to the
    /// request's connection info.
    pub public_base_url: Option<String>,
    /// `maxTimeoutSeconds` advertised in payment requirements
    pub max_timeout_seconds: u64,
    /// Lifetime of a subscription purchase
    pub subscription_period_secs: u64,
    pub download_url_ttl_secs: u64,
    /// Object storage for file routes (None = file routes fail)
    pub storage: Option<StorageConfig>,
    /// CORS allowed origins
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute
    pub rate_limit_rpm: u32,
    /// Bearer token required for /metrics endpoint (None = public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("payment_address", &self.payment_address)
            .field("facilitator_url", &self.facilitator_url)
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("db_path", &self.db_path)
            .field("port", &self.port)
            .field("public_base_url", &self.public_base_url)
            .field("max_timeout_seconds", &self.max_timeout_seconds)
            .field("subscription_period_secs", &self.subscription_period_secs)
            .field("download_url_ttl_secs", &self.download_url_ttl_secs)
            .field("storage", &self.storage)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl GatewayConfig {
    /// Defaults for everything except the payee.
    pub fn new(payment_address: Address) -> Self {
        Self {
            payment_address,
            facilitator_url: DEFAULT_FACILITATOR_URL.to_string(),
            hmac_secret: None,
            db_path: DEFAULT_DB_PATH.to_string(),
            port: DEFAULT_PORT,
            public_base_url: None,
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            subscription_period_secs: DEFAULT_SUBSCRIPTION_PERIOD_SECS,
            download_url_ttl_secs: DEFAULT_DOWNLOAD_URL_TTL_SECS,
            storage: None,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            rate_limit_rpm: DEFAULT_RATE_LIMIT_RPM,
            metrics_token: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let payment_address_str = env::var("PAYMENT_ADDRESS")
            .map_err(|_| ConfigError::MissingRequired("PAYMENT_ADDRESS"))?;
        let payment_address: Address = payment_address_str
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(payment_address_str))?;

        let mut config = Self::new(payment_address);

        if let Some(url) = non_empty("FACILITATOR_URL") {
            Url::parse(&url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
            config.facilitator_url = url;
        }

        config.hmac_secret = non_empty("FACILITATOR_SHARED_SECRET").map(String::into_bytes);
        if let Some(ref secret) = config.hmac_secret {
            if secret.len() < 32 {
                tracing::warn!(
                    "FACILITATOR_SHARED_SECRET is short ({} bytes); use at least 32",
                    secret.len()
                );
            }
        }

        if let Some(path) = non_empty("DB_PATH") {
            config.db_path = path;
        }

        config.port = parsed("PORT")?.unwrap_or(DEFAULT_PORT);

        if let Some(base) = non_empty("PUBLIC_BASE_URL") {
            Url::parse(&base).map_err(|_| ConfigError::InvalidUrl(base.clone()))?;
            config.public_base_url = Some(base.trim_end_matches('/').to_string());
        }

        config.max_timeout_seconds =
            parsed("MAX_TIMEOUT_SECONDS")?.unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS);
        config.subscription_period_secs =
            parsed("SUBSCRIPTION_PERIOD_SECS")?.unwrap_or(DEFAULT_SUBSCRIPTION_PERIOD_SECS);
        config.download_url_ttl_secs =
            parsed("DOWNLOAD_URL_TTL_SECS")?.unwrap_or(DEFAULT_DOWNLOAD_URL_TTL_SECS);
        if config.subscription_period_secs == 0 {
            return Err(ConfigError::InvalidNumber("SUBSCRIPTION_PERIOD_SECS"));
        }

        config.storage = storage_from_env()?;
        if config.storage.is_none() {
            tracing::warn!("STORAGE_* not configured; file routes will fail to dispatch");
        }

        if let Ok(origins) = env::var("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        config.rate_limit_rpm = parsed("RATE_LIMIT_RPM")?.unwrap_or(DEFAULT_RATE_LIMIT_RPM);
        if config.rate_limit_rpm == 0 {
            return Err(ConfigError::InvalidNumber("RATE_LIMIT_RPM"));
        }

        config.metrics_token = non_empty("METRICS_TOKEN");
        if config.metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is publicly accessible");
        }

        Ok(config)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(None),
    }
}

/// All four of endpoint, bucket and credentials must be set, or none.
fn storage_from_env() -> Result<Option<StorageConfig>, ConfigError> {
    let endpoint = non_empty("STORAGE_ENDPOINT");
    let bucket = non_empty("STORAGE_BUCKET");
    let access_key = non_empty("STORAGE_ACCESS_KEY");
    let secret_key = non_empty("STORAGE_SECRET_KEY");

    match (endpoint, bucket, access_key, secret_key) {
        (None, None, None, None) => Ok(None),
        (Some(endpoint), Some(bucket), Some(access_key), Some(secret_key)) => {
            Url::parse(&endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint.clone()))?;
            Ok(Some(StorageConfig {
                endpoint,
                bucket,
                access_key,
                secret_key,
                region: non_empty("STORAGE_REGION")
                    .unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
            }))
        }
        _ => Err(ConfigError::IncompleteStorage),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {0}")]
    InvalidNumber(&'static str),

    #[error("STORAGE_ENDPOINT, STORAGE_BUCKET, STORAGE_ACCESS_KEY and STORAGE_SECRET_KEY must be set together")]
    IncompleteStorage,
}
