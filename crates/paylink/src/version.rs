//! Per-version protocol behavior.
//!
//! Everything that differs between x402 v1 and v2 lives here, so the gate
//! selects a [`ProtocolVersion`] once per route and never branches on the
//! version number itself.

use serde::{Deserialize, Serialize};

use crate::constants::{
    HEADER_V1_PAYMENT, HEADER_V1_PAYMENT_RESPONSE, HEADER_V2_PAYMENT,
    HEADER_V2_PAYMENT_REQUIRED, HEADER_V2_PAYMENT_RESPONSE, NETWORK_V1_MAIN, NETWORK_V1_TEST,
    NETWORK_V2_MAIN, NETWORK_V2_TEST,
};
use crate::error::PaylinkError;
use crate::facilitator::FacilitatorRequest;
use crate::network::NetworkMode;
use crate::payment::{
    PaymentRequiredBody, PaymentRequirements, PaymentRequirementsV2, ResourceInfo,
};
use crate::proof::PaymentProof;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1,
    V2,
}

/// Requirements as they appear on the wire for a given version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WireRequirements {
    V1(PaymentRequirements),
    V2(PaymentRequirementsV2),
}

impl ProtocolVersion {
    /// Map a stored version number. Routes created before versioning carry 0.
    pub fn from_number(n: u32) -> Result<Self, PaylinkError> {
        match n {
            0 | 1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            other => Err(PaylinkError::UnsupportedVersion(other)),
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }

    /// Request header carrying the client's proof token.
    pub fn payment_header(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => HEADER_V1_PAYMENT,
            ProtocolVersion::V2 => HEADER_V2_PAYMENT,
        }
    }

    /// Response header carrying the encoded settlement receipt.
    pub fn payment_response_header(&self) -> &'static str {
        match self {
            ProtocolVersion::V1 => HEADER_V1_PAYMENT_RESPONSE,
            ProtocolVersion::V2 => HEADER_V2_PAYMENT_RESPONSE,
        }
    }

    /// Response header mirroring the 402 body, if this version defines one.
    pub fn payment_required_header(&self) -> Option<&'static str> {
        match self {
            ProtocolVersion::V1 => None,
            ProtocolVersion::V2 => Some(HEADER_V2_PAYMENT_REQUIRED),
        }
    }

    pub fn network_id(&self, mode: NetworkMode) -> &'static str {
        match (self, mode) {
            (ProtocolVersion::V1, NetworkMode::Test) => NETWORK_V1_TEST,
            (ProtocolVersion::V1, NetworkMode::Main) => NETWORK_V1_MAIN,
            (ProtocolVersion::V2, NetworkMode::Test) => NETWORK_V2_TEST,
            (ProtocolVersion::V2, NetworkMode::Main) => NETWORK_V2_MAIN,
        }
    }

    pub fn wire_requirements(&self, requirements: &PaymentRequirements) -> WireRequirements {
        match self {
            ProtocolVersion::V1 => WireRequirements::V1(requirements.clone()),
            ProtocolVersion::V2 => WireRequirements::V2(requirements.into()),
        }
    }

    pub fn payment_required_body(
        &self,
        requirements: &PaymentRequirements,
        error: &str,
    ) -> PaymentRequiredBody<WireRequirements> {
        let resource = match self {
            ProtocolVersion::V1 => None,
            ProtocolVersion::V2 => Some(ResourceInfo::from(requirements)),
        };
        PaymentRequiredBody {
            x402_version: self.number(),
            error: error.to_string(),
            resource,
            accepts: vec![self.wire_requirements(requirements)],
        }
    }

    /// Body for both `/verify` and `/settle`.
    pub fn facilitator_request(
        &self,
        proof: &PaymentProof,
        requirements: &PaymentRequirements,
    ) -> FacilitatorRequest {
        FacilitatorRequest {
            x402_version: self.number(),
            payment_payload: proof.payload.clone(),
            payment_requirements: self.wire_requirements(requirements),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirements::{build_requirements, RequirementsInput};
    use alloy::primitives::Address;

    fn sample(version: ProtocolVersion) -> PaymentRequirements {
        build_requirements(&RequirementsInput {
            version,
            price: 10_000,
            network: NetworkMode::Test,
            pay_to: Address::repeat_byte(0x11),
            resource: "https://pay.example/abc".to_string(),
            description: None,
            max_timeout_seconds: 60,
        })
    }

    #[test]
    fn test_header_names() {
        assert_eq!(ProtocolVersion::V1.payment_header(), "X-PAYMENT");
        assert_eq!(ProtocolVersion::V2.payment_header(), "PAYMENT-SIGNATURE");
        assert_eq!(ProtocolVersion::V1.payment_response_header(), "X-PAYMENT-RESPONSE");
        assert!(ProtocolVersion::V1.payment_required_header().is_none());
        assert_eq!(
            ProtocolVersion::V2.payment_required_header(),
            Some("PAYMENT-REQUIRED")
        );
    }

    #[test]
    fn test_stored_version_zero_means_v1() {
        assert_eq!(ProtocolVersion::from_number(0).unwrap(), ProtocolVersion::V1);
        assert_eq!(ProtocolVersion::from_number(2).unwrap(), ProtocolVersion::V2);
        assert!(ProtocolVersion::from_number(3).is_err());
    }

    #[test]
    fn test_v1_body_shape() {
        let req = sample(ProtocolVersion::V1);
        let body = ProtocolVersion::V1.payment_required_body(&req, "X-PAYMENT header is required");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["error"], "X-PAYMENT header is required");
        assert!(json.get("resource").is_none());
        assert_eq!(json["accepts"][0]["maxAmountRequired"], "10000");
        assert_eq!(json["accepts"][0]["network"], "base-sepolia");
        assert_eq!(json["accepts"][0]["resource"], "https://pay.example/abc");
    }

    #[test]
    fn test_v2_body_shape() {
        let req = sample(ProtocolVersion::V2);
        let body = ProtocolVersion::V2.payment_required_body(&req, "payment required");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["x402Version"], 2);
        assert_eq!(json["resource"]["url"], "https://pay.example/abc");
        assert_eq!(json["accepts"][0]["amount"], "10000");
        assert_eq!(json["accepts"][0]["network"], "eip155:84532");
        assert!(json["accepts"][0].get("maxAmountRequired").is_none());
        assert_eq!(json["accepts"][0]["extra"]["name"], "USDC");
    }
}
