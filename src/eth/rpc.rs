//! Read-only ERC-20 contract calls over Ethereum JSON-RPC

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{keccak256, Address, U256};
use http::StatusCode;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

// ============================================================================
// ERC-20 calls
// ============================================================================

static BALANCE_OF_SELECTOR: Lazy<[u8; 4]> = Lazy::new(|| selector("balanceOf(address)"));
static DECIMALS_SELECTOR: Lazy<[u8; 4]> = Lazy::new(|| selector("decimals()"));

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// The ERC-20 view functions the wallet reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erc20Call {
    BalanceOf(Address),
    Decimals,
}

impl Erc20Call {
    pub fn function_name(&self) -> &'static str {
        match self {
            Erc20Call::BalanceOf(_) => "balanceOf",
            Erc20Call::Decimals => "decimals",
        }
    }

    /// ABI-encoded calldata: 4-byte selector followed by 32-byte words
    pub fn calldata(&self) -> Vec<u8> {
        match self {
            Erc20Call::BalanceOf(owner) => {
                let mut data = Vec::with_capacity(36);
                data.extend_from_slice(&*BALANCE_OF_SELECTOR);
                data.extend_from_slice(owner.into_word().as_slice());
                data
            }
            Erc20Call::Decimals => DECIMALS_SELECTOR.to_vec(),
        }
    }
}

/// Decode a single `uint256` return word
pub fn decode_uint256(data: &[u8]) -> Result<U256, ChainError> {
    if data.len() < 32 {
        return Err(ChainError::InvalidReturnData {
            len: data.len(),
        });
    }
    Ok(U256::from_be_slice(&data[..32]))
}

// ============================================================================
// ChainClient
// ============================================================================

/// Reads view functions of a contract on one chain.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    async fn read_contract(&self, contract: Address, call: Erc20Call) -> Result<U256, ChainError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("RPC returned no result for {0}")]
    EmptyResult(&'static str),
    #[error("Invalid hex in eth_call result")]
    InvalidHex,
    #[error("eth_call returned {len} bytes, expected at least 32")]
    InvalidReturnData { len: usize },
    #[error("Token reported out-of-range decimals: {0}")]
    InvalidDecimals(U256),
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// [`ChainClient`] speaking Ethereum JSON-RPC (`eth_call`) over HTTP.
#[derive(Debug)]
pub struct JsonRpcChainClient {
    url: Url,
    client: Client,
    timeout: Option<Duration>,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: None,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request(&self, method: &'static str, params: Value) -> Result<Value, ChainError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let mut req = self.client.post(self.url.clone()).json(&body);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req
            .send()
            .await
            .map_err(|e| ChainError::Http { context: method, source: e })?;
        let parsed: JsonRpcResponse = handle_response(response, method).await?;

        if let Some(error) = parsed.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        parsed.result.ok_or(ChainError::EmptyResult(method))
    }

    /// `eth_call` against the latest block, returning raw return data
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let params = json!([
            {
                "to": to.to_string(),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest"
        ]);
        let result = self.request("eth_call", params).await?;
        let hex_str = result.as_str().ok_or(ChainError::EmptyResult("eth_call"))?;
        hex::decode(hex_str.trim_start_matches("0x")).map_err(|_| ChainError::InvalidHex)
    }
}

impl TryFrom<&str> for JsonRpcChainClient {
    type Error = ChainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(value).map_err(|e| ChainError::UrlParse {
            context: "Failed to parse RPC url",
            source: e,
        })?;
        Ok(JsonRpcChainClient::new(url))
    }
}

#[async_trait::async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn read_contract(&self, contract: Address, call: Erc20Call) -> Result<U256, ChainError> {
        tracing::debug!(%contract, function = call.function_name(), url = %self.url, "eth_call");
        let data = self.eth_call(contract, &call.calldata()).await?;
        decode_uint256(&data)
    }
}

async fn handle_response<R: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &'static str,
) -> Result<R, ChainError> {
    if response.status() == StatusCode::OK {
        response
            .json::<R>()
            .await
            .map_err(|e| ChainError::JsonDeserialization { context, source: e })
    } else {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChainError::ResponseBodyRead { context, source: e })?;
        Err(ChainError::HttpStatus { context, status, body })
    }
}
