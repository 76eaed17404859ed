use alloy::primitives::{address, Address};

/// x402 scheme name for exact-amount transfers.
pub const SCHEME_NAME: &str = "exact";

/// USDC has 6 decimal places; route prices are stored in these minor units.
pub const TOKEN_DECIMALS: u32 = 6;

/// Minor units per whole token (10^TOKEN_DECIMALS).
pub const UNITS_PER_TOKEN: u64 = 1_000_000;

/// USDC on Base mainnet.
pub const USDC_BASE: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");

/// EIP-712 domain name of the mainnet USDC contract.
pub const USDC_NAME_MAIN: &str = "USD Coin";

/// EIP-712 domain name of the Sepolia USDC contract.
pub const USDC_NAME_TEST: &str = "USDC";

/// EIP-712 domain version shared by both USDC deployments.
pub const USDC_VERSION: &str = "2";

/// Legacy (v1) network names.
pub const NETWORK_V1_MAIN: &str = "base";
pub const NETWORK_V1_TEST: &str = "base-sepolia";

/// CAIP-2 network identifiers used by protocol v2.
pub const NETWORK_V2_MAIN: &str = "eip155:8453";
pub const NETWORK_V2_TEST: &str = "eip155:84532";

/// Proof and settlement headers per protocol version.
pub const HEADER_V1_PAYMENT: &str = "X-PAYMENT";
pub const HEADER_V1_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";
pub const HEADER_V2_PAYMENT: &str = "PAYMENT-SIGNATURE";
pub const HEADER_V2_PAYMENT_RESPONSE: &str = "PAYMENT-RESPONSE";
pub const HEADER_V2_PAYMENT_REQUIRED: &str = "PAYMENT-REQUIRED";

/// Default public facilitator.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Default `maxTimeoutSeconds` advertised in requirements.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Header carrying the HMAC of a facilitator request body, when a shared secret is configured.
pub const FACILITATOR_AUTH_HEADER: &str = "X-Facilitator-Auth";
