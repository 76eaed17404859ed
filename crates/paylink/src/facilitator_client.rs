//! HTTP client for a remote facilitator's `/verify` and `/settle` endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::constants::FACILITATOR_AUTH_HEADER;
use crate::error::PaylinkError;
use crate::facilitator::{Facilitator, FacilitatorRequest};
use crate::response::{SettleResponse, VerifyResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Facilitator reached over HTTP. Requests are optionally signed with an
/// HMAC of the body when a shared secret is configured.
#[derive(Clone)]
pub struct HttpFacilitator {
    client: reqwest::Client,
    base_url: String,
    hmac_secret: Option<Vec<u8>>,
}

impl HttpFacilitator {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            hmac_secret: None,
        }
    }

    pub fn with_hmac_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.hmac_secret = Some(secret.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &FacilitatorRequest,
    ) -> Result<T, PaylinkError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let body = serde_json::to_vec(request)?;

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT);

        if let Some(secret) = &self.hmac_secret {
            let sig = crate::hmac::compute_hmac(secret, &body);
            builder = builder.header(FACILITATOR_AUTH_HEADER, sig);
        }

        let resp = builder
            .body(body)
            .send()
            .await
            .map_err(|e| PaylinkError::FacilitatorTransport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "facilitator returned error status");
            return Err(PaylinkError::FacilitatorStatus {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| PaylinkError::FacilitatorDecode(e.to_string()))
    }
}

impl Facilitator for HttpFacilitator {
    async fn verify(&self, request: &FacilitatorRequest) -> Result<VerifyResponse, PaylinkError> {
        self.post("verify", request).await
    }

    async fn settle(&self, request: &FacilitatorRequest) -> Result<SettleResponse, PaylinkError> {
        self.post("settle", request).await
    }
}
