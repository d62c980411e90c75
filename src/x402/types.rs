//! Wire types of the x402 protocol, versions 1 and 2 (EVM only)

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::eth::network::chain_id_for;

// ============================================================================
// Protocol Version
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum X402Version {
    /// Body-carried 402, `X-PAYMENT` header, legacy network names
    V1,
    /// `PAYMENT-REQUIRED` header, `PAYMENT-SIGNATURE` header, CAIP-2 networks
    V2,
}

impl X402Version {
    pub fn as_u8(&self) -> u8 {
        match self {
            X402Version::V1 => 1,
            X402Version::V2 => 2,
        }
    }
}

impl Serialize for X402Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl Display for X402Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported x402Version: {0}")]
pub struct X402VersionError(pub u8);

impl TryFrom<u8> for X402Version {
    type Error = X402VersionError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(X402Version::V1),
            2 => Ok(X402Version::V2),
            _ => Err(X402VersionError(value)),
        }
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        X402Version::try_from(num).map_err(serde::de::Error::custom)
    }
}

fn default_x402_version() -> X402Version {
    X402Version::V1
}

// ============================================================================
// Hex Encoded Nonce
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexEncodedNonce(pub [u8; 32]);

impl HexEncodedNonce {
    pub fn random() -> Self {
        HexEncodedNonce(rand::random())
    }
}

impl Display for HexEncodedNonce {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for HexEncodedNonce {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexEncodedNonce {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Nonce must be 32 bytes"))?;
        Ok(HexEncodedNonce(arr))
    }
}

// ============================================================================
// Token Amount
// ============================================================================

/// Integer amount in the asset's smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub U256);

impl Display for TokenAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(U256::from(value))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Servers send decimal strings; a few send bare integers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(TokenAmount(U256::from(n))),
            Raw::Str(s) => {
                // U256::from_str would read a 0x prefix as hex; amounts are decimal
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(serde::de::Error::custom(format!(
                        "Invalid token amount: {s:?}"
                    )));
                }
                U256::from_str(&s)
                    .map(TokenAmount)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

// ============================================================================
// Payment Requirements
// ============================================================================

/// One payment option offered by a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    /// CAIP-2 (`eip155:8453`) for v2, a legacy name (`base-sepolia`) for v1
    pub network: String,
    #[serde(alias = "maxAmountRequired")]
    pub amount: TokenAmount,
    pub asset: String,
    pub pay_to: String,
    #[serde(default)]
    pub max_timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Extract a string field from a JSON object
fn json_string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(ToOwned::to_owned)
}

impl PaymentRequirements {
    /// EVM chain ID of the requirement's network, if it names one
    pub fn chain_id(&self) -> Option<u64> {
        chain_id_for(&self.network)
    }

    /// EIP-712 domain `name` and `version` carried in `extra`
    pub fn eip712_name_version(&self) -> Option<(String, String)> {
        let extra = self.extra.as_ref()?;
        Some((
            json_string_field(extra, "name")?,
            json_string_field(extra, "version")?,
        ))
    }
}

// ============================================================================
// Payment Required (402 response)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    #[serde(default = "default_x402_version")]
    pub x402_version: X402Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

// ============================================================================
// Payment Payload
// ============================================================================

/// Signed authorization sent back on the retried request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: X402Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<PaymentRequirements>,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl PaymentPayload {
    /// v1 envelope: scheme and network at the top level
    pub fn v1(requirements: &PaymentRequirements, payload: Value) -> Self {
        PaymentPayload {
            x402_version: X402Version::V1,
            scheme: Some(requirements.scheme.clone()),
            network: Some(requirements.network.clone()),
            resource: None,
            accepted: None,
            payload,
            extensions: None,
        }
    }

    /// v2 envelope: the accepted requirement is echoed back with the resource
    pub fn v2(required: &PaymentRequired, requirements: &PaymentRequirements, payload: Value) -> Self {
        PaymentPayload {
            x402_version: X402Version::V2,
            scheme: None,
            network: None,
            resource: required.resource.clone(),
            accepted: Some(requirements.clone()),
            payload,
            extensions: required.extensions.clone(),
        }
    }
}

// ============================================================================
// Settlement Response
// ============================================================================

/// Payment confirmation returned in `PAYMENT-RESPONSE` / `X-PAYMENT-RESPONSE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_v1_requirements_alias() {
        let req: PaymentRequirements = serde_json::from_value(json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "10000",
            "resource": "https://api.example.com/data",
            "description": "weather",
            "mimeType": "application/json",
            "payTo": "0x2222222222222222222222222222222222222222",
            "maxTimeoutSeconds": 60,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2" }
        }))
        .unwrap();

        assert_eq!(req.amount, TokenAmount::from(10_000));
        assert_eq!(req.chain_id(), Some(84532));
        assert_eq!(
            req.eip712_name_version(),
            Some(("USDC".to_string(), "2".to_string()))
        );

        // Re-serialized under the v2 field name
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["amount"], "10000");
        assert!(value.get("maxAmountRequired").is_none());
    }

    #[test]
    fn test_v2_payment_required() {
        let required: PaymentRequired = serde_json::from_value(json!({
            "x402Version": 2,
            "resource": { "url": "https://api.example.com/data" },
            "accepts": [{
                "scheme": "exact",
                "network": "eip155:8453",
                "amount": "400000",
                "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                "payTo": "0x2222222222222222222222222222222222222222",
                "maxTimeoutSeconds": 300
            }]
        }))
        .unwrap();

        assert_eq!(required.x402_version, X402Version::V2);
        assert_eq!(required.accepts.len(), 1);
        assert_eq!(required.accepts[0].chain_id(), Some(8453));
        assert!(required.accepts[0].eip712_name_version().is_none());
    }

    #[test]
    fn test_version_defaults_and_rejects() {
        let required: PaymentRequired = serde_json::from_value(json!({ "accepts": [] })).unwrap();
        assert_eq!(required.x402_version, X402Version::V1);
        assert!(serde_json::from_value::<PaymentRequired>(json!({ "x402Version": 7 })).is_err());
    }

    #[test]
    fn test_token_amount_forms() {
        let a: TokenAmount = serde_json::from_str("\"600000\"").unwrap();
        let b: TokenAmount = serde_json::from_str("600000").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<TokenAmount>("\"0x10\"").is_err());
        assert!(serde_json::from_str::<TokenAmount>("\"-1\"").is_err());
    }

    #[test]
    fn test_payload_envelopes() {
        let required: PaymentRequired = serde_json::from_value(json!({
            "x402Version": 2,
            "resource": { "url": "https://api.example.com/data" },
            "accepts": [{
                "scheme": "exact",
                "network": "eip155:84532",
                "amount": "1",
                "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                "payTo": "0x2222222222222222222222222222222222222222"
            }]
        }))
        .unwrap();
        let req = &required.accepts[0];

        let v2 = serde_json::to_value(PaymentPayload::v2(&required, req, json!({}))).unwrap();
        assert_eq!(v2["x402Version"], 2);
        assert_eq!(v2["accepted"]["network"], "eip155:84532");
        assert_eq!(v2["resource"]["url"], "https://api.example.com/data");
        assert!(v2.get("scheme").is_none());

        let v1 = serde_json::to_value(PaymentPayload::v1(req, json!({}))).unwrap();
        assert_eq!(v1["x402Version"], 1);
        assert_eq!(v1["scheme"], "exact");
        assert!(v1.get("accepted").is_none());
    }

    #[test]
    fn test_settlement_response() {
        let settled: SettlementResponse = serde_json::from_value(json!({
            "success": true,
            "transaction": "0xabc",
            "network": "eip155:8453",
            "payer": "0x1111111111111111111111111111111111111111"
        }))
        .unwrap();
        assert!(settled.success);
        assert_eq!(settled.transaction.as_deref(), Some("0xabc"));
        assert!(settled.error_reason.is_none());
    }
}
