use thiserror::Error;

/// Errors returned by paylink protocol operations.
#[derive(Debug, Error)]
pub enum PaylinkError {
    #[error("invalid payment proof: {0}")]
    InvalidProof(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u32),

    #[error("facilitator request failed: {0}")]
    FacilitatorTransport(String),

    #[error("facilitator returned {status}: {body}")]
    FacilitatorStatus { status: u16, body: String },

    #[error("facilitator response could not be decoded: {0}")]
    FacilitatorDecode(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
