use actix_web::http::header;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

#[derive(Debug)]
pub enum GatewayError {
    /// Database error
    Database(rusqlite::Error),
    /// Unique constraint hit (short code or purchase key)
    Duplicate(String),
    /// No enabled route with this short code
    RouteNotFound(String),
    /// Request method differs from the route's method
    MethodNotAllowed { allowed: String },
    /// Route definition rejected at creation
    InvalidRoute(String),
    /// Malformed client request
    BadRequest(String),
    /// Payment settled but the purchase could not be stored
    UnrecordedPayment(String),
    /// Object storage signing error
    Storage(String),
    /// Upstream unreachable
    ProxyError(String),
    /// Internal error
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Database(e) => write!(f, "database error: {}", e),
            GatewayError::Duplicate(msg) => write!(f, "duplicate: {}", msg),
            GatewayError::RouteNotFound(code) => write!(f, "route not found: {}", code),
            GatewayError::MethodNotAllowed { allowed } => {
                write!(f, "method not allowed, expected {}", allowed)
            }
            GatewayError::InvalidRoute(msg) => write!(f, "invalid route: {}", msg),
            GatewayError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            GatewayError::UnrecordedPayment(msg) => write!(f, "unrecorded payment: {}", msg),
            GatewayError::Storage(msg) => write!(f, "storage error: {}", msg),
            GatewayError::ProxyError(msg) => write!(f, "proxy error: {}", msg),
            GatewayError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<rusqlite::Error> for GatewayError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref err, _) = e {
            if err.extended_code == 2067 {
                // SQLITE_CONSTRAINT_UNIQUE
                return GatewayError::Duplicate(e.to_string());
            }
        }
        GatewayError::Database(e)
    }
}

impl From<paylink::PaylinkError> for GatewayError {
    fn from(e: paylink::PaylinkError) -> Self {
        GatewayError::Internal(e.to_string())
    }
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "internal_error",
        "message": "An internal error occurred"
    }))
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::RouteNotFound(code) => HttpResponse::NotFound().json(serde_json::json!({
                "error": "route_not_found",
                "message": format!("Route '{}' not found", code)
            })),
            GatewayError::MethodNotAllowed { allowed } => HttpResponse::MethodNotAllowed()
                .insert_header((header::ALLOW, allowed.as_str()))
                .json(serde_json::json!({
                    "error": "method_not_allowed",
                    "message": format!("This route only accepts {}", allowed)
                })),
            GatewayError::InvalidRoute(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_route",
                "message": msg
            })),
            GatewayError::BadRequest(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "bad_request",
                "message": msg
            })),
            GatewayError::Duplicate(msg) => {
                tracing::error!("Unexpected duplicate: {}", msg);
                internal_error()
            }
            GatewayError::UnrecordedPayment(msg) => {
                tracing::error!(critical = true, "Unrecorded payment: {}", msg);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "payment_not_recorded",
                    "message": "Payment was settled but could not be recorded; contact the operator"
                }))
            }
            GatewayError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                internal_error()
            }
            GatewayError::ProxyError(msg) => {
                tracing::error!("Proxy error: {}", msg);
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "proxy_error",
                    "message": "Failed to reach upstream service"
                }))
            }
            GatewayError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal_error()
            }
            GatewayError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GatewayError::RouteNotFound("abc".into()), StatusCode::NOT_FOUND),
            (
                GatewayError::MethodNotAllowed {
                    allowed: "GET".into(),
                },
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            (GatewayError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (GatewayError::ProxyError("x".into()), StatusCode::BAD_GATEWAY),
            (
                GatewayError::UnrecordedPayment("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (GatewayError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.error_response().status(), status, "{err}");
        }
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let resp = GatewayError::MethodNotAllowed {
            allowed: "POST".into(),
        }
        .error_response();
        assert_eq!(resp.headers().get(header::ALLOW).unwrap(), "POST");
    }
}
