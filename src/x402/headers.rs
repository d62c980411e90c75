//! x402 header names and their base64-JSON encoding

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use http::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::X402Version;

/// v2: base64 JSON `PaymentRequired` on the 402 response
pub const PAYMENT_REQUIRED: &str = "payment-required";
/// v2: base64 JSON `PaymentPayload` on the retried request
pub const PAYMENT_SIGNATURE: &str = "payment-signature";
/// v2: base64 JSON `SettlementResponse` on the paid response
pub const PAYMENT_RESPONSE: &str = "payment-response";
/// v1: base64 JSON `PaymentPayload` on the retried request
pub const X_PAYMENT: &str = "x-payment";
/// v1: base64 JSON `SettlementResponse` on the paid response
pub const X_PAYMENT_RESPONSE: &str = "x-payment-response";

/// Request header carrying the payment for a given protocol version
pub fn payment_header_name(version: X402Version) -> &'static str {
    match version {
        X402Version::V1 => X_PAYMENT,
        X402Version::V2 => PAYMENT_SIGNATURE,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HeaderCodecError {
    #[error("Failed to encode header JSON")]
    JsonEncode(#[source] serde_json::Error),
    #[error("Failed to decode header JSON")]
    JsonDecode(#[source] serde_json::Error),
    #[error("Header is not valid base64")]
    Base64(#[source] base64::DecodeError),
    #[error("Header is not visible ASCII")]
    NotAscii(#[source] http::header::ToStrError),
    #[error("Invalid header value")]
    InvalidValue(#[source] http::header::InvalidHeaderValue),
}

pub fn encode_header<T: Serialize>(value: &T) -> Result<HeaderValue, HeaderCodecError> {
    let json = serde_json::to_vec(value).map_err(HeaderCodecError::JsonEncode)?;
    HeaderValue::from_str(&b64.encode(json)).map_err(HeaderCodecError::InvalidValue)
}

pub fn decode_header<T: DeserializeOwned>(value: &HeaderValue) -> Result<T, HeaderCodecError> {
    let text = value.to_str().map_err(HeaderCodecError::NotAscii)?;
    let bytes = b64.decode(text.trim()).map_err(HeaderCodecError::Base64)?;
    serde_json::from_slice(&bytes).map_err(HeaderCodecError::JsonDecode)
}

/// The settlement header of a paid response, whichever version set it
pub fn settlement_header(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers
        .get(PAYMENT_RESPONSE)
        .or_else(|| headers.get(X_PAYMENT_RESPONSE))
}
