//! Settlement network selection.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::constants::{
    USDC_BASE, USDC_BASE_SEPOLIA, USDC_NAME_MAIN, USDC_NAME_TEST, USDC_VERSION,
};
use crate::payment::AssetExtra;

/// Which settlement network a route charges on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    Test,
    Main,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::Test => "test",
            NetworkMode::Main => "main",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, NetworkMode::Test)
    }

    /// Stablecoin contract used for settlement on this network.
    pub fn asset(&self) -> Address {
        match self {
            NetworkMode::Test => USDC_BASE_SEPOLIA,
            NetworkMode::Main => USDC_BASE,
        }
    }

    /// EIP-712 domain metadata of the stablecoin contract.
    pub fn asset_extra(&self) -> AssetExtra {
        let name = match self {
            NetworkMode::Test => USDC_NAME_TEST,
            NetworkMode::Main => USDC_NAME_MAIN,
        };
        AssetExtra {
            name: name.to_string(),
            version: USDC_VERSION.to_string(),
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(NetworkMode::Test),
            "main" => Ok(NetworkMode::Main),
            other => Err(format!("unknown network mode '{other}'")),
        }
    }
}
