//! Browser-facing 402 page.

use actix_web::http::header::{HeaderName, ACCEPT, USER_AGENT};
use actix_web::HttpRequest;
use paylink::format_price;

use crate::db::{ResourceType, Route};

/// Browsers get HTML, everything else gets JSON.
pub fn is_browser(req: &HttpRequest) -> bool {
    header_str(req, ACCEPT).contains("text/html")
        && header_str(req, USER_AGENT).contains("Mozilla")
}

fn header_str(req: &HttpRequest, name: HeaderName) -> &str {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub struct PaywallPage<'a> {
    pub route: &'a Route,
    pub reason: &'a str,
    /// Pretty-printed 402 body, embedded for wallets and extensions
    pub requirements_json: &'a str,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// JSON inside a `<script>` block must not be able to close it.
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/").replace("<!--", "<\\!--")
}

pub fn render(page: &PaywallPage<'_>) -> String {
    let route = page.route;
    let title = route.title.as_deref().unwrap_or("Payment required");
    let description = route.description.as_deref().unwrap_or("");
    let kind = match route.resource_type {
        ResourceType::Url => "API endpoint".to_string(),
        ResourceType::File => match route.original_filename.as_deref() {
            Some(name) => format!("File: {name}"),
            None => "File download".to_string(),
        },
    };
    let network = if route.network.is_test() {
        r#"<span class="badge">testnet</span>"#
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 32rem; margin: 4rem auto; padding: 0 1rem; color: #111; }}
.amount {{ font-size: 2rem; font-weight: 600; margin: 1rem 0; }}
.badge {{ background: #fde68a; border-radius: 4px; padding: 0 .4rem; font-size: .8rem; }}
.reason {{ color: #b91c1c; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>{description}</p>
<p>{kind} {network}</p>
<div class="amount">{amount} USDC</div>
<p class="reason">{reason}</p>
<p>Pay with an x402-compatible wallet to continue.</p>
<script type="application/json" id="payment-requirements">{requirements}</script>
</body>
</html>"#,
        title = escape_html(title),
        description = escape_html(description),
        kind = escape_html(&kind),
        network = network,
        amount = format_price(route.price),
        reason = escape_html(page.reason),
        requirements = escape_script(page.requirements_json),
    )
}
