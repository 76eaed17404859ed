//! Requirements Builder: route price + network -> payment requirements.

use alloy::primitives::Address;

use crate::constants::{SCHEME_NAME, TOKEN_DECIMALS};
use crate::network::NetworkMode;
use crate::payment::PaymentRequirements;
use crate::version::ProtocolVersion;

/// Route prices are always expressed in 1e-6 of the settlement currency.
pub const PRICE_DECIMALS: u32 = 6;

const MIME_TYPE: &str = "application/json";

/// Everything the builder needs. Identical inputs always produce identical
/// output so a client can reconstruct the requirements it was charged under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementsInput {
    pub version: ProtocolVersion,
    /// Price in minor units (1e-6).
    pub price: u64,
    pub network: NetworkMode,
    pub pay_to: Address,
    /// Fully-qualified URL of the resource being charged for.
    pub resource: String,
    pub description: Option<String>,
    pub max_timeout_seconds: u64,
}

/// Scale a minor-unit price to the asset's smallest unit.
pub fn to_asset_units(price: u64, asset_decimals: u32) -> u128 {
    let price = u128::from(price);
    if asset_decimals >= PRICE_DECIMALS {
        price * 10u128.pow(asset_decimals - PRICE_DECIMALS)
    } else {
        price / 10u128.pow(PRICE_DECIMALS - asset_decimals)
    }
}

pub fn build_requirements(input: &RequirementsInput) -> PaymentRequirements {
    PaymentRequirements {
        scheme: SCHEME_NAME.to_string(),
        network: input.version.network_id(input.network).to_string(),
        max_amount_required: to_asset_units(input.price, TOKEN_DECIMALS).to_string(),
        resource: input.resource.clone(),
        description: input.description.clone().unwrap_or_default(),
        mime_type: MIME_TYPE.to_string(),
        pay_to: input.pay_to,
        max_timeout_seconds: input.max_timeout_seconds,
        asset: input.network.asset(),
        extra: input.network.asset_extra(),
    }
}
