//! x402 protocol pieces for the paylink gateway.
//!
//! Builds payment requirements for a priced route, decodes client proofs,
//! and talks to a facilitator that verifies and settles payments.
//!
//! # Flow
//!
//! - The gateway builds [`PaymentRequirements`] from a route's price and network
//! - A client pays and retries with a proof in the version's payment header
//! - The gateway asks a [`Facilitator`] to verify, then settle, that proof
//!
//! Protocol v1 and v2 differ only in header names, network identifiers and
//! the requirements wire shape; [`ProtocolVersion`] owns those differences.

pub mod constants;
pub mod error;
pub mod hmac;
pub mod network;
pub mod payment;
pub mod price;
pub mod proof;
pub mod requirements;
pub mod response;
pub mod version;

pub mod facilitator;
pub mod facilitator_client;

pub use constants::*;
pub use error::PaylinkError;
pub use facilitator::{Facilitator, FacilitatorRequest};
pub use facilitator_client::HttpFacilitator;
pub use network::NetworkMode;
pub use payment::*;
pub use price::format_price;
pub use proof::{encode_header, PaymentProof};
pub use requirements::{build_requirements, RequirementsInput};
pub use response::*;
pub use version::{ProtocolVersion, WireRequirements};
