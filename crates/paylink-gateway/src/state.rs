use paylink::{Facilitator, HttpFacilitator};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::db::Database;
use crate::dispatch::Dispatcher;
use crate::error::GatewayError;
use crate::gate::{Clock, GateSettings, PaymentGate};
use crate::storage::{S3Presigner, UrlSigner};

/// Shared application state
pub struct AppState<F = HttpFacilitator> {
    pub config: Arc<GatewayConfig>,
    pub db: Arc<Database>,
    pub gate: PaymentGate<F>,
    pub dispatcher: Dispatcher,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            db: Arc::clone(&self.db),
            gate: self.gate.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl AppState<HttpFacilitator> {
    /// Production wiring: HTTP facilitator and S3 signer from config.
    pub fn new(config: GatewayConfig, db: Database) -> Result<Self, GatewayError> {
        let mut facilitator = HttpFacilitator::new(
            reqwest::Client::builder()
                .build()
                .map_err(|e| GatewayError::Internal(format!("failed to create HTTP client: {e}")))?,
            config.facilitator_url.clone(),
        );
        if let Some(ref secret) = config.hmac_secret {
            facilitator = facilitator.with_hmac_secret(secret.clone());
        }

        let signer = match config.storage {
            Some(ref storage) => Some(Arc::new(S3Presigner::new(storage)?) as Arc<dyn UrlSigner>),
            None => None,
        };

        Self::with_parts(config, db, facilitator, signer)
    }
}

impl<F: Facilitator + 'static> AppState<F> {
    pub fn with_parts(
        config: GatewayConfig,
        db: Database,
        facilitator: F,
        signer: Option<Arc<dyn UrlSigner>>,
    ) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to create HTTP client: {e}")))?;

        let db = Arc::new(db);
        let settings = GateSettings {
            default_pay_to: config.payment_address,
            max_timeout_seconds: config.max_timeout_seconds,
            subscription_period_secs: i64::try_from(config.subscription_period_secs)
                .map_err(|_| GatewayError::Internal("subscription period too large".to_string()))?,
        };
        let gate = PaymentGate::new(Arc::clone(&db), Arc::new(facilitator), settings);
        let dispatcher = Dispatcher::new(
            http_client,
            signer,
            Duration::from_secs(config.download_url_ttl_secs),
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            gate,
            dispatcher,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.gate = self.gate.with_clock(clock);
        self
    }
}
