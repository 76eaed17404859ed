use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use bytes::Bytes;
use paylink::{HEADER_V1_PAYMENT, HEADER_V2_PAYMENT};

use crate::error::GatewayError;
use crate::metrics::{PROXY_LATENCY, PROXY_REQUESTS_TOTAL};

/// Header carrying the owner's shared secret to the upstream.
pub const PROXY_SECRET_HEADER: &str = "Paylink-Secret";

/// Hop-by-hop headers, never forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Request headers dropped on top of the hop-by-hop set.
const REQUEST_HEADERS_TO_STRIP: &[&str] = &[
    "host",           // Set from the target URL
    "content-length", // Will be recalculated
    "paylink-secret", // Only the gateway may set this
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.contains(&name)
}

/// Header names a `Connection` header marks as hop-by-hop for this message.
fn connection_tokens<'a>(values: impl Iterator<Item = &'a [u8]>) -> Vec<String> {
    values
        .filter_map(|v| std::str::from_utf8(v).ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn strip_response_header(name: &str, listed: &[String]) -> bool {
    // Body is re-framed by actix
    is_hop_by_hop(name) || name == "content-length" || listed.iter().any(|t| t == name)
}

fn strip_request_header(name: &str, listed: &[String]) -> bool {
    listed.iter().any(|t| t == name)
        || is_hop_by_hop(name)
        || REQUEST_HEADERS_TO_STRIP.contains(&name)
        || name.eq_ignore_ascii_case(HEADER_V1_PAYMENT)
        || name.eq_ignore_ascii_case(HEADER_V2_PAYMENT)
}

/// Append the inbound query string to the route target.
///
/// Newlines and null bytes are rejected in both raw and percent-decoded form;
/// any fragment is dropped.
pub fn build_target_url(target: &str, query: Option<&str>) -> Result<String, GatewayError> {
    let query = match query {
        Some(q) => q,
        None => return Ok(target.to_string()),
    };
    let query = match query.find('#') {
        Some(idx) => &query[..idx],
        None => query,
    };

    // Scan bytes: the decoded form need not be valid UTF-8
    let decoded = urlencoding::decode_binary(query.as_bytes());
    for bytes in [query.as_bytes(), decoded.as_ref()] {
        if bytes.iter().any(|b| matches!(b, b'\r' | b'\n')) {
            return Err(GatewayError::BadRequest(
                "query string must not contain newlines".to_string(),
            ));
        }
        if bytes.contains(&0) {
            return Err(GatewayError::BadRequest(
                "query string must not contain null bytes".to_string(),
            ));
        }
    }

    if query.is_empty() {
        return Ok(target.to_string());
    }
    let separator = if target.contains('?') { '&' } else { '?' };
    Ok(format!("{target}{separator}{query}"))
}

/// Forward the request and stream the upstream response back.
pub async fn proxy_request(
    client: &reqwest::Client,
    original_req: &HttpRequest,
    target_url: &str,
    body: Bytes,
    proxy_secret: Option<&str>,
) -> Result<HttpResponse, GatewayError> {
    let method = reqwest::Method::from_bytes(original_req.method().as_str().as_bytes())
        .map_err(|_| GatewayError::BadRequest("unsupported HTTP method".to_string()))?;

    let mut request_builder = client.request(method, target_url);

    let listed = connection_tokens(
        original_req
            .headers()
            .get_all(actix_web::http::header::CONNECTION)
            .map(|v| v.as_bytes()),
    );

    // Copy headers from original request (except stripped ones)
    for (name, value) in original_req.headers() {
        if !strip_request_header(name.as_str(), &listed) {
            request_builder = request_builder.header(name.as_str(), value.as_bytes());
        }
    }

    if let Some(secret) = proxy_secret {
        request_builder = request_builder.header(PROXY_SECRET_HEADER, secret);
    }

    if !body.is_empty() {
        request_builder = request_builder.body(body);
    }

    PROXY_REQUESTS_TOTAL.inc();
    let timer = PROXY_LATENCY.start_timer();
    let response = request_builder.send().await.map_err(|e| {
        tracing::error!(error = %e, "proxy request failed");
        GatewayError::ProxyError("upstream request failed".to_string())
    })?;
    timer.observe_duration();

    let status = StatusCode::from_u16(response.status().as_u16())
        .map_err(|_| GatewayError::ProxyError("invalid upstream status".to_string()))?;
    let mut builder = HttpResponse::build(status);

    let listed = connection_tokens(
        response
            .headers()
            .get_all(reqwest::header::CONNECTION)
            .iter()
            .map(|v| v.as_bytes()),
    );

    for (name, value) in response.headers() {
        let name = name.as_str();
        if strip_response_header(name, &listed) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            builder.append_header((name, value));
        }
    }

    Ok(builder.streaming(response.bytes_stream()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_header_stripping() {
        assert!(strip_request_header("host", &[]));
        assert!(strip_request_header("connection", &[]));
        assert!(strip_request_header("x-payment", &[]));
        assert!(strip_request_header("payment-signature", &[]));
        assert!(strip_request_header("paylink-secret", &[]));
        assert!(!strip_request_header("content-type", &[]));
        assert!(!strip_request_header("authorization", &[]));
        assert!(strip_request_header("x-trace", &["x-trace".to_string()]));
    }

    #[test]
    fn test_connection_listed_headers_stripped() {
        let values: [&[u8]; 2] = [b"close, X-Internal-Trace", b" Keep-Alive ,,x-debug"];
        let listed = connection_tokens(values.into_iter());
        assert_eq!(listed, ["close", "x-internal-trace", "keep-alive", "x-debug"]);

        assert!(strip_response_header("x-internal-trace", &listed));
        assert!(strip_response_header("x-debug", &listed));
        assert!(strip_response_header("transfer-encoding", &listed));
        assert!(strip_response_header("content-length", &[]));
        assert!(!strip_response_header("content-type", &listed));
        assert!(!strip_response_header("x-ratelimit-remaining", &listed));
    }

    #[test]
    fn test_build_target_url() {
        assert_eq!(
            build_target_url("https://api.example.com/data", None).unwrap(),
            "https://api.example.com/data"
        );
        assert_eq!(
            build_target_url("https://api.example.com/data", Some("city=paris&units=c")).unwrap(),
            "https://api.example.com/data?city=paris&units=c"
        );
        assert_eq!(
            build_target_url("https://api.example.com/data?key=1", Some("city=paris")).unwrap(),
            "https://api.example.com/data?key=1&city=paris"
        );
        assert_eq!(
            build_target_url("https://api.example.com/data", Some("a=1#frag")).unwrap(),
            "https://api.example.com/data?a=1"
        );
    }

    #[test]
    fn test_build_target_url_rejects_injection() {
        assert!(build_target_url("https://x.test", Some("a=1%0d%0aHost:evil")).is_err());
        assert!(build_target_url("https://x.test", Some("a=%00")).is_err());
        // Invalid UTF-8 next to the escape must not hide it
        assert!(build_target_url("https://x.test", Some("a=%ff%0d%0aX-Evil:1")).is_err());
        assert!(build_target_url("https://x.test", Some("a=%c3%00")).is_err());
    }
}
