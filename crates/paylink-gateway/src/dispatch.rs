//! Dispatcher: serve an authorized request.
//!
//! `url` routes are reverse-proxied. `file` routes are answered with a
//! presigned download URL, as a redirect for browsers and as JSON otherwise.

use actix_web::http::header::{HeaderName, HeaderValue, LOCATION};
use actix_web::{HttpRequest, HttpResponse};
use bytes::Bytes;
use paylink::encode_header;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{ResourceType, Route};
use crate::error::GatewayError;
use crate::gate::Authorization;
use crate::metrics::FILE_DOWNLOADS;
use crate::paywall::is_browser;
use crate::proxy::{build_target_url, proxy_request};
use crate::storage::UrlSigner;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct DownloadLink {
    pub download_url: String,
    pub filename: String,
}

#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    signer: Option<Arc<dyn UrlSigner>>,
    download_ttl: Duration,
}

impl Dispatcher {
    pub fn new(
        client: reqwest::Client,
        signer: Option<Arc<dyn UrlSigner>>,
        download_ttl: Duration,
    ) -> Self {
        Self {
            client,
            signer,
            download_ttl,
        }
    }

    pub async fn dispatch(
        &self,
        req: &HttpRequest,
        body: Bytes,
        route: &Route,
        proxy_secret: Option<&str>,
        authorization: &Authorization,
    ) -> Result<HttpResponse, GatewayError> {
        let mut response = match route.resource_type {
            ResourceType::Url => {
                let target = build_target_url(&route.target, req.uri().query())?;
                proxy_request(&self.client, req, &target, body, proxy_secret).await?
            }
            ResourceType::File => self.download(req, route)?,
        };

        if let Some(settlement) = authorization.settlement() {
            let name = HeaderName::from_bytes(route.version()?.payment_response_header().as_bytes())
                .map_err(|e| GatewayError::Internal(e.to_string()))?;
            let value = HeaderValue::from_str(&encode_header(settlement)?)
                .map_err(|e| GatewayError::Internal(e.to_string()))?;
            response.headers_mut().insert(name, value);
        }

        tracing::debug!(
            short_code = %route.short_code,
            purchase_id = authorization.purchase().id,
            status = response.status().as_u16(),
            "dispatched"
        );
        Ok(response)
    }

    fn download(&self, req: &HttpRequest, route: &Route) -> Result<HttpResponse, GatewayError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| GatewayError::Storage("object storage is not configured".to_string()))?;

        let filename = route
            .original_filename
            .clone()
            .unwrap_or_else(|| fallback_filename(&route.target));
        let download_url = signer.presign_download(&route.target, self.download_ttl, Some(&filename))?;
        FILE_DOWNLOADS.inc();

        if is_browser(req) {
            return Ok(HttpResponse::Found()
                .insert_header((LOCATION, download_url))
                .finish());
        }
        Ok(HttpResponse::Ok().json(DownloadLink {
            download_url,
            filename,
        }))
    }
}

fn fallback_filename(key: &str) -> String {
    key.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_filename() {
        assert_eq!(fallback_filename("uploads/2024/report.pdf"), "report.pdf");
        assert_eq!(fallback_filename("report.pdf"), "report.pdf");
        assert_eq!(fallback_filename("dir/"), "dir");
        assert_eq!(fallback_filename(""), "download");
    }
}
