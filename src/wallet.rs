//! The wallet facade: one account, one network, a paying HTTP client and a
//! balance reader.

use std::sync::Arc;

use alloy_primitives::Address;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Response;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;

use crate::balance::{read_balance, Balance};
use crate::config::{WalletConfig, WalletOptions};
use crate::error::WalletError;
use crate::eth::{ChainClient, EvmSigner, JsonRpcChainClient};
use crate::x402::headers::{decode_header, settlement_header};
use crate::x402::{x402_client, MaxPaymentPolicy, SettlementResponse, X402Client};

/// Environment variable read by [`create_wallet_from_env`] by default
pub const DEFAULT_KEY_ENV: &str = "X402_PRIVATE_KEY";

/// Method, headers and body of a request made through [`Wallet::fetch`]
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Outcome of [`Wallet::get`] and [`Wallet::post`]
#[derive(Debug, Clone, PartialEq)]
pub struct PaidResponse {
    pub status: StatusCode,
    /// Parsed JSON body, or the raw text as a JSON string when it is not JSON
    pub data: Value,
    /// Whether the server confirmed a payment
    pub paid: bool,
    /// Decoded payment confirmation, when the server sent a readable one
    pub payment: Option<SettlementResponse>,
}

impl PaidResponse {
    pub async fn from_response(response: Response) -> Result<Self, WalletError> {
        let status = response.status();
        let settlement = settlement_header(response.headers()).cloned();
        let text = response.text().await?;

        let payment = settlement.as_ref().and_then(|value| {
            decode_header::<SettlementResponse>(value)
                .map_err(|e| tracing::debug!(error = %e, "Unreadable payment response header"))
                .ok()
        });
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(Self {
            status,
            data,
            paid: settlement.is_some(),
            payment,
        })
    }
}

pub struct Wallet {
    signer: Arc<EvmSigner>,
    config: WalletConfig,
    http: ClientWithMiddleware,
    chain: Option<Arc<dyn ChainClient>>,
}

impl Wallet {
    /// Wallet with the default `exact` EVM schemes and the configured budget
    pub fn new(signer: EvmSigner, config: WalletConfig) -> Result<Self, WalletError> {
        let signer = Arc::new(signer);
        let x402 = X402Client::with_default_schemes(signer.clone())
            .with_policy(Arc::new(MaxPaymentPolicy::new(config.policy.clone())));
        Self::with_x402(signer, config, x402)
    }

    /// Wallet around a caller-assembled protocol client
    pub fn with_x402(
        signer: Arc<EvmSigner>,
        config: WalletConfig,
        x402: X402Client,
    ) -> Result<Self, WalletError> {
        let http = x402_client(x402, &config.client)?;
        let chain = config.chain.as_ref().map(|profile| {
            let mut client = JsonRpcChainClient::new(profile.rpc_url.clone());
            if let Some(timeout) = config.client.timeout {
                client = client.with_timeout(timeout);
            }
            Arc::new(client) as Arc<dyn ChainClient>
        });

        tracing::debug!(address = %signer.address(), network = %config.network, "Wallet ready");
        Ok(Self {
            signer,
            config,
            http,
            chain,
        })
    }

    /// Replace the chain client used for balance queries
    pub fn with_chain_client(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn network(&self) -> &str {
        &self.config.network
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// The paying HTTP client, for callers that want raw responses
    pub fn http_client(&self) -> &ClientWithMiddleware {
        &self.http
    }

    /// Send a request, paying once if the server answers 402
    pub async fn fetch(&self, url: &str, init: RequestInit) -> Result<Response, WalletError> {
        let mut request = self.http.request(init.method, url).headers(init.headers);
        if let Some(body) = init.body {
            request = request.body(body);
        }
        Ok(request.send().await?)
    }

    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<PaidResponse, WalletError> {
        let response = self
            .fetch(
                url,
                RequestInit {
                    method: Method::GET,
                    headers,
                    body: None,
                },
            )
            .await?;
        PaidResponse::from_response(response).await
    }

    /// POST `body` as JSON
    pub async fn post(
        &self,
        url: &str,
        body: &Value,
        mut headers: HeaderMap,
    ) -> Result<PaidResponse, WalletError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| WalletError::Configuration(format!("unserializable request body: {e}")))?;
        headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        let response = self
            .fetch(
                url,
                RequestInit {
                    method: Method::POST,
                    headers,
                    body: Some(bytes),
                },
            )
            .await?;
        PaidResponse::from_response(response).await
    }

    /// USDC balance of the account on the wallet's network
    pub async fn get_balance(&self) -> Result<Balance, WalletError> {
        let chain = self
            .chain
            .as_deref()
            .ok_or_else(|| WalletError::UnsupportedNetwork(self.config.network.clone()))?;
        read_balance(chain, self.address(), &self.config.network).await
    }

    /// Release the wallet. Nothing is held beyond memory, so this only drops it.
    pub fn close(self) {
        tracing::debug!(address = %self.signer.address(), "Wallet closed");
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.signer.address())
            .field("network", &self.config.network)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Constructors
// ============================================================================

pub fn create_wallet(private_key: &str, options: WalletOptions) -> Result<Wallet, WalletError> {
    let signer = EvmSigner::from_private_key(private_key)?;
    let config = WalletConfig::from_options(&options)?;
    Wallet::new(signer, config)
}

/// Read the key from `var_name` (default `X402_PRIVATE_KEY`)
pub fn create_wallet_from_env(
    var_name: Option<&str>,
    options: WalletOptions,
) -> Result<Wallet, WalletError> {
    let var_name = var_name.unwrap_or(DEFAULT_KEY_ENV);
    let key = std::env::var(var_name)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            WalletError::Configuration(format!("environment variable {var_name} is not set"))
        })?;
    create_wallet(&key, options)
}

/// Only the paying HTTP client, without the rest of the wallet
pub fn create_paid_fetch(
    private_key: &str,
    options: WalletOptions,
) -> Result<ClientWithMiddleware, WalletError> {
    Ok(create_wallet(private_key, options)?.http.clone())
}
