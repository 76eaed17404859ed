//! Payment-gated reverse proxy.
//!
//! Each route is reachable at `/{short_code}` and charges per request over
//! x402. The [`gate`] decides whether a request has paid, the
//! [`dispatch`]er serves it.

pub mod config;
pub mod cors;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod metrics;
pub mod paywall;
pub mod proxy;
pub mod routes;
pub mod shortcode;
pub mod state;
pub mod storage;

pub use config::GatewayConfig;
pub use db::Database;
pub use error::GatewayError;
pub use state::AppState;
