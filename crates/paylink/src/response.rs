use serde::{Deserialize, Serialize};

/// Response from the facilitator's `/verify` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Response from the facilitator's `/settle` endpoint. Stored verbatim as the
/// settlement receipt of a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Transaction hash, if settlement succeeded. `None` on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default)]
    pub network: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_response_tolerates_missing_optionals() {
        let resp: VerifyResponse = serde_json::from_str(r#"{"isValid":true}"#).unwrap();
        assert!(resp.is_valid);
        assert!(resp.invalid_reason.is_none());
    }

    #[test]
    fn test_settle_response_wire_names() {
        let resp: SettleResponse = serde_json::from_str(
            r#"{"success":false,"errorReason":"insufficient_funds","network":"base-sepolia"}"#,
        )
        .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_reason.as_deref(), Some("insufficient_funds"));
        assert_eq!(resp.network, "base-sepolia");
    }
}
