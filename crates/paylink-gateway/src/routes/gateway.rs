use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use paylink::{encode_header, Facilitator, PaymentRequirements, ProtocolVersion};

use crate::db::{ResourceType, Route};
use crate::error::GatewayError;
use crate::gate::{GateOutcome, GateRequest};
use crate::paywall::{self, is_browser, PaywallPage};
use crate::proxy::build_target_url;
use crate::state::AppState;

/// Public URL of a route, as charged for in the requirements.
fn resource_url(req: &HttpRequest, public_base_url: Option<&str>, short_code: &str) -> String {
    match public_base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), short_code),
        None => {
            let info = req.connection_info();
            format!("{}://{}/{}", info.scheme(), info.host(), short_code)
        }
    }
}

/// Build the 402 for a route: HTML for browsers, JSON for everything else.
fn payment_required_response(
    req: &HttpRequest,
    route: &Route,
    requirements: &PaymentRequirements,
    version: ProtocolVersion,
    reason: &str,
) -> Result<HttpResponse, GatewayError> {
    let body = version.payment_required_body(requirements, reason);
    let mut builder = HttpResponse::PaymentRequired();

    if let Some(name) = version.payment_required_header() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let value = HeaderValue::from_str(&encode_header(&body)?)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        builder.insert_header((name, value));
    }

    if is_browser(req) {
        let requirements_json = serde_json::to_string_pretty(&body)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let html = paywall::render(&PaywallPage {
            route,
            reason,
            requirements_json: &requirements_json,
        });
        return Ok(builder.content_type("text/html; charset=utf-8").body(html));
    }

    Ok(builder.json(body))
}

/// ANY /{short_code} - Payment-gated resource
pub async fn gateway<F: Facilitator + 'static>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState<F>>,
) -> Result<HttpResponse, GatewayError> {
    let short_code = path.into_inner();

    let route = state
        .db
        .find_enabled_route_by_short_code(&short_code)?
        .ok_or_else(|| GatewayError::RouteNotFound(short_code.clone()))?;

    if !route.method.eq_ignore_ascii_case(req.method().as_str()) {
        return Err(GatewayError::MethodNotAllowed {
            allowed: route.method.clone(),
        });
    }

    let version = route.version()?;

    // Reject unforwardable queries before anyone pays
    if route.resource_type == ResourceType::Url {
        build_target_url(&route.target, req.uri().query())?;
    }

    let owner = state.db.get_owner(route.owner_id)?;
    let proof_token = req
        .headers()
        .get(version.payment_header())
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let outcome = state
        .gate
        .authorize(GateRequest {
            route: route.clone(),
            owner_pay_to: owner.as_ref().and_then(|o| o.payment_address),
            resource_url: resource_url(&req, state.config.public_base_url.as_deref(), &short_code),
            proof_token,
        })
        .await?;

    match outcome {
        GateOutcome::PaymentRequired {
            requirements,
            version,
            reason,
        } => payment_required_response(&req, &route, &requirements, version, &reason),
        GateOutcome::Authorized(authorization) => {
            let proxy_secret = owner.as_ref().and_then(|o| o.proxy_secret.as_deref());
            state
                .dispatcher
                .dispatch(&req, body, &route, proxy_secret, &authorization)
                .await
        }
    }
}

/// Configure the gateway route. Registered last: it matches any single
/// path segment.
pub fn configure<F: Facilitator + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/{short_code}").route(web::route().to(gateway::<F>)));
}
