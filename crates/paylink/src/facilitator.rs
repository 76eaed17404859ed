//! The facilitator seam: the external service that checks a proof and then
//! moves the money.

use std::future::Future;

use serde::Serialize;

use crate::error::PaylinkError;
use crate::response::{SettleResponse, VerifyResponse};
use crate::version::WireRequirements;

/// Request body shared by `/verify` and `/settle`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    pub x402_version: u32,
    pub payment_payload: serde_json::Value,
    pub payment_requirements: WireRequirements,
}

/// Verify then settle. Implementations must not retry settlement on their
/// own; a retried settle can double-charge.
pub trait Facilitator: Send + Sync {
    fn verify(
        &self,
        request: &FacilitatorRequest,
    ) -> impl Future<Output = Result<VerifyResponse, PaylinkError>> + Send;

    fn settle(
        &self,
        request: &FacilitatorRequest,
    ) -> impl Future<Output = Result<SettleResponse, PaylinkError>> + Send;
}
