//! Payment proof tokens: base64-encoded JSON carried in the version's
//! payment header.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::error::PaylinkError;
use crate::version::ProtocolVersion;

/// Upper bound on an encoded proof token. Real proofs are well under 2 KiB.
pub const MAX_PROOF_LEN: usize = 16 * 1024;

/// A decoded client proof. `token` is the exact header value and is what the
/// ledger keys purchases by.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentProof {
    pub token: String,
    pub version: u32,
    pub payload: serde_json::Value,
}

impl PaymentProof {
    /// Decode a header value and check it speaks the route's protocol version.
    pub fn decode(token: &str, expected: ProtocolVersion) -> Result<Self, PaylinkError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PaylinkError::InvalidProof("empty proof".to_string()));
        }
        if token.len() > MAX_PROOF_LEN {
            return Err(PaylinkError::InvalidProof("proof too large".to_string()));
        }

        let bytes = STANDARD
            .decode(token)
            .map_err(|e| PaylinkError::InvalidProof(format!("bad base64: {e}")))?;
        let payload: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| PaylinkError::InvalidProof(format!("bad json: {e}")))?;

        if !payload.is_object() {
            return Err(PaylinkError::InvalidProof("proof is not an object".to_string()));
        }

        let version = payload
            .get("x402Version")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| PaylinkError::InvalidProof("missing x402Version".to_string()))?;
        let version = u32::try_from(version)
            .map_err(|_| PaylinkError::InvalidProof("x402Version out of range".to_string()))?;

        if ProtocolVersion::from_number(version)? != expected {
            return Err(PaylinkError::InvalidProof(format!(
                "expected x402Version {}, got {version}",
                expected.number()
            )));
        }

        Ok(Self {
            token: token.to_string(),
            version,
            payload,
        })
    }
}

/// Base64-encode a JSON document for use as a header value.
pub fn encode_header<T: Serialize>(value: &T) -> Result<String, PaylinkError> {
    Ok(STANDARD.encode(serde_json::to_vec(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(v: serde_json::Value) -> String {
        STANDARD.encode(serde_json::to_vec(&v).unwrap())
    }

    #[test]
    fn test_decode_v1_proof() {
        let token = encode(serde_json::json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {"signature": "0xdead"}
        }));
        let proof = PaymentProof::decode(&token, ProtocolVersion::V1).unwrap();
        assert_eq!(proof.version, 1);
        assert_eq!(proof.token, token);
        assert_eq!(proof.payload["payload"]["signature"], "0xdead");
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let token = encode(serde_json::json!({"x402Version": 2}));
        assert!(PaymentProof::decode(&token, ProtocolVersion::V1).is_err());
        assert!(PaymentProof::decode(&token, ProtocolVersion::V2).is_ok());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(PaymentProof::decode("", ProtocolVersion::V1).is_err());
        assert!(PaymentProof::decode("not base64!!", ProtocolVersion::V1).is_err());
        assert!(PaymentProof::decode(&STANDARD.encode(b"[1,2]"), ProtocolVersion::V1).is_err());
        assert!(PaymentProof::decode(&encode(serde_json::json!({})), ProtocolVersion::V1).is_err());
        let huge = "A".repeat(MAX_PROOF_LEN + 4);
        assert!(PaymentProof::decode(&huge, ProtocolVersion::V1).is_err());
    }

    #[test]
    fn test_encode_header() {
        let encoded = encode_header(&serde_json::json!({"success": true})).unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, br#"{"success":true}"#);
    }
}
