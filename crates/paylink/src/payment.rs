use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Asset metadata needed by clients to build the EIP-712 signing domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetExtra {
    pub name: String,
    pub version: String,
}

/// Canonical requirements document for one priced resource.
///
/// This is the protocol v1 wire shape. Protocol v2 sends the
/// [`PaymentRequirementsV2`] projection and moves the resource fields
/// into a separate [`ResourceInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// Amount in the asset's smallest unit, as a decimal string.
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: Address,
    pub max_timeout_seconds: u64,
    pub asset: Address,
    pub extra: AssetExtra,
}

/// Protocol v2 requirements entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsV2 {
    pub scheme: String,
    pub network: String,
    pub amount: String,
    pub pay_to: Address,
    pub max_timeout_seconds: u64,
    pub asset: Address,
    pub extra: AssetExtra,
}

impl From<&PaymentRequirements> for PaymentRequirementsV2 {
    fn from(req: &PaymentRequirements) -> Self {
        Self {
            scheme: req.scheme.clone(),
            network: req.network.clone(),
            amount: req.max_amount_required.clone(),
            pay_to: req.pay_to,
            max_timeout_seconds: req.max_timeout_seconds,
            asset: req.asset,
            extra: req.extra.clone(),
        }
    }
}

/// Description of the resource being charged for (protocol v2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub url: String,
    pub description: String,
    pub mime_type: String,
}

impl From<&PaymentRequirements> for ResourceInfo {
    fn from(req: &PaymentRequirements) -> Self {
        Self {
            url: req.resource.clone(),
            description: req.description.clone(),
            mime_type: req.mime_type.clone(),
        }
    }
}

/// The 402 response body returned to programmatic clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody<T> {
    pub x402_version: u32,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
    pub accepts: Vec<T>,
}
