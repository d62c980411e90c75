//! End-to-end payment flows against a local x402 server

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, U256};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use x402_wallet::eth::eip712::{Eip712Domain, SignedTransferWithAuthorization};
use x402_wallet::eth::{ChainClient, ChainError, Erc20Call, USDC};
use x402_wallet::Balance;
use x402_wallet::x402::headers::{
    decode_header, encode_header, PAYMENT_REQUIRED, PAYMENT_RESPONSE, PAYMENT_SIGNATURE,
    X_PAYMENT, X_PAYMENT_RESPONSE,
};
use x402_wallet::x402::{PaymentPayload, SettlementResponse, TokenAmount, X402Version};
use x402_wallet::{create_wallet, create_wallet_from_env, Wallet, WalletError, WalletOptions};

const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";
const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

// ============================================================================
// Scripted x402 server
// ============================================================================

struct Paywall {
    version: X402Version,
    amount: u64,
    /// Answer 402 even when a payment header is present
    always_402: bool,
    requests: AtomicUsize,
    payments: Mutex<Vec<PaymentPayload>>,
}

impl Paywall {
    fn new(version: X402Version, amount: u64) -> Arc<Self> {
        Self::build(version, amount, false)
    }

    fn stubborn(version: X402Version, amount: u64) -> Arc<Self> {
        Self::build(version, amount, true)
    }

    fn build(version: X402Version, amount: u64, always_402: bool) -> Arc<Self> {
        Arc::new(Self {
            version,
            amount,
            always_402,
            requests: AtomicUsize::new(0),
            payments: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn network(&self) -> &'static str {
        match self.version {
            X402Version::V1 => "base-sepolia",
            X402Version::V2 => "eip155:84532",
        }
    }

    fn challenge(&self) -> Response {
        let amount = self.amount.to_string();
        match self.version {
            X402Version::V1 => {
                let body = json!({
                    "x402Version": 1,
                    "error": "X-PAYMENT header is required",
                    "accepts": [{
                        "scheme": "exact",
                        "network": self.network(),
                        "maxAmountRequired": amount,
                        "resource": "http://localhost/paid",
                        "description": "Paid report",
                        "mimeType": "application/json",
                        "payTo": PAY_TO,
                        "maxTimeoutSeconds": 60,
                        "asset": USDC_BASE_SEPOLIA,
                        "extra": { "name": "USDC", "version": "2" }
                    }]
                });
                (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
            }
            X402Version::V2 => {
                let required = json!({
                    "x402Version": 2,
                    "resource": { "url": "http://localhost/paid" },
                    "accepts": [{
                        "scheme": "exact",
                        "network": self.network(),
                        "amount": amount,
                        "asset": USDC_BASE_SEPOLIA,
                        "payTo": PAY_TO,
                        "maxTimeoutSeconds": 60,
                        "extra": { "name": "USDC", "version": "2" }
                    }]
                });
                let header = encode_header(&required).unwrap();
                (StatusCode::PAYMENT_REQUIRED, [(PAYMENT_REQUIRED, header)], "{}").into_response()
            }
        }
    }
}

async fn paywall(State(state): State<Arc<Paywall>>, headers: HeaderMap, body: String) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let (request_header, response_header) = match state.version {
        X402Version::V1 => (X_PAYMENT, X_PAYMENT_RESPONSE),
        X402Version::V2 => (PAYMENT_SIGNATURE, PAYMENT_RESPONSE),
    };

    match headers.get(request_header) {
        Some(value) if !state.always_402 => {
            let payment: PaymentPayload = decode_header(value).unwrap();
            state.payments.lock().unwrap().push(payment);
            let settled = SettlementResponse {
                success: true,
                transaction: Some("0xfeed".into()),
                network: Some(state.network().into()),
                payer: None,
                error_reason: None,
            };
            let header = encode_header(&settled).unwrap();
            let reply = json!({ "report": "ok", "echo": body });
            (StatusCode::OK, [(response_header, header)], Json(reply)).into_response()
        }
        _ => state.challenge(),
    }
}

async fn serve(paywall_state: Arc<Paywall>) -> String {
    let router = Router::new()
        .route("/paid", any(paywall))
        .route("/free", get(|| async { Json(json!({ "free": true })) }))
        .route("/text", get(|| async { "plain text, not json" }))
        .with_state(paywall_state);
    listen(router).await
}

async fn listen(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn wallet(max_payment: Option<u64>) -> Wallet {
    let mut options = WalletOptions::default().network("eip155:84532");
    options.max_payment = max_payment;
    create_wallet(KEY, options).unwrap()
}

fn sepolia_domain() -> Eip712Domain {
    Eip712Domain {
        name: "USDC".into(),
        version: "2".into(),
        chain_id: 84532,
        verifying_contract: USDC_BASE_SEPOLIA.parse().unwrap(),
    }
}

// ============================================================================
// Budget
// ============================================================================

#[tokio::test]
async fn test_over_budget_is_rejected_without_retry() {
    let state = Paywall::new(X402Version::V2, 600_000);
    let base = serve(state.clone()).await;

    let err = wallet(Some(50))
        .get(&format!("{base}/paid"), HeaderMap::new())
        .await
        .unwrap_err();

    match err {
        WalletError::PolicyRejection { payment_required, .. } => {
            assert_eq!(payment_required.accepts.len(), 1);
            assert_eq!(payment_required.accepts[0].amount, TokenAmount::from(600_000));
        }
        other => panic!("expected policy rejection, got {other:?}"),
    }
    assert_eq!(state.requests(), 1);
    assert!(state.payments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_within_budget_is_paid() {
    let state = Paywall::new(X402Version::V2, 400_000);
    let base = serve(state.clone()).await;
    let wallet = wallet(Some(50));

    let response = wallet.get(&format!("{base}/paid"), HeaderMap::new()).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.paid);
    assert_eq!(response.data["report"], "ok");
    let payment = response.payment.unwrap();
    assert!(payment.success);
    assert_eq!(payment.transaction.as_deref(), Some("0xfeed"));
    assert_eq!(state.requests(), 2);

    let payments = state.payments.lock().unwrap();
    let payload = &payments[0];
    assert_eq!(payload.x402_version, X402Version::V2);
    let accepted = payload.accepted.as_ref().unwrap();
    assert_eq!(accepted.amount, TokenAmount::from(400_000));
    assert_eq!(accepted.network, "eip155:84532");

    let signed: SignedTransferWithAuthorization =
        serde_json::from_value(payload.payload.clone()).unwrap();
    assert_eq!(signed.authorization.value.0, U256::from(400_000u64));
    assert_eq!(signed.authorization.from.parse::<Address>().unwrap(), wallet.address());
    assert_eq!(signed.authorization.to.parse::<Address>().unwrap(), PAY_TO.parse::<Address>().unwrap());
    assert_eq!(signed.recover_signer(&sepolia_domain()).unwrap(), wallet.address());
}

#[tokio::test]
async fn test_unlimited_budget_pays_any_amount() {
    let state = Paywall::new(X402Version::V2, 250_000_000);
    let base = serve(state.clone()).await;

    let response = wallet(None).get(&format!("{base}/paid"), HeaderMap::new()).await.unwrap();
    assert!(response.paid);
    assert_eq!(state.requests(), 2);
}

// ============================================================================
// Retry bound and response handling
// ============================================================================

#[tokio::test]
async fn test_second_402_is_terminal() {
    let state = Paywall::stubborn(X402Version::V2, 10_000);
    let base = serve(state.clone()).await;

    let response = wallet(Some(50)).get(&format!("{base}/paid"), HeaderMap::new()).await.unwrap();

    assert_eq!(response.status, StatusCode::PAYMENT_REQUIRED);
    assert!(!response.paid);
    assert_eq!(state.requests(), 2);
}

#[tokio::test]
async fn test_free_resource_is_not_paid() {
    let state = Paywall::new(X402Version::V2, 10_000);
    let base = serve(state.clone()).await;

    let response = wallet(Some(50)).get(&format!("{base}/free"), HeaderMap::new()).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.paid);
    assert!(response.payment.is_none());
    assert_eq!(response.data, json!({ "free": true }));
    assert_eq!(state.requests(), 0);
}

#[tokio::test]
async fn test_non_json_body_falls_back_to_text() {
    let base = serve(Paywall::new(X402Version::V2, 10_000)).await;

    let response = wallet(None).get(&format!("{base}/text"), HeaderMap::new()).await.unwrap();
    assert_eq!(response.data, Value::String("plain text, not json".into()));
    assert!(!response.paid);
}

#[tokio::test]
async fn test_post_body_is_resent_with_payment() {
    let state = Paywall::new(X402Version::V2, 10_000);
    let base = serve(state.clone()).await;

    let body = json!({ "text": "hello" });
    let response = wallet(Some(50))
        .post(&format!("{base}/paid"), &body, HeaderMap::new())
        .await
        .unwrap();

    assert!(response.paid);
    let echoed: Value = serde_json::from_str(response.data["echo"].as_str().unwrap()).unwrap();
    assert_eq!(echoed, body);
    assert_eq!(state.requests(), 2);
}

#[tokio::test]
async fn test_v1_body_challenge() {
    let state = Paywall::new(X402Version::V1, 10_000);
    let base = serve(state.clone()).await;

    let response = wallet(Some(50)).get(&format!("{base}/paid"), HeaderMap::new()).await.unwrap();
    assert!(response.paid);
    assert_eq!(response.payment.unwrap().network.as_deref(), Some("base-sepolia"));

    let payments = state.payments.lock().unwrap();
    let payload = &payments[0];
    assert_eq!(payload.x402_version, X402Version::V1);
    assert_eq!(payload.scheme.as_deref(), Some("exact"));
    assert_eq!(payload.network.as_deref(), Some("base-sepolia"));
    assert!(payload.accepted.is_none());
}

// ============================================================================
// Balance and construction
// ============================================================================

struct FixedChain;

#[async_trait::async_trait]
impl ChainClient for FixedChain {
    async fn read_contract(&self, contract: Address, call: Erc20Call) -> Result<U256, ChainError> {
        assert_eq!(contract, USDC::try_by_network_id("eip155:84532").unwrap().address());
        Ok(match call {
            Erc20Call::BalanceOf(_) => U256::from(1_500_000u64),
            Erc20Call::Decimals => U256::from(6u8),
        })
    }
}

#[tokio::test]
async fn test_balance_through_wallet() {
    let wallet = wallet(None).with_chain_client(Arc::new(FixedChain));
    let balance = wallet.get_balance().await.unwrap();
    assert_eq!(balance.formatted, "1.5");
    assert_eq!(balance.currency, "USDC");
    assert_eq!(balance.network, "eip155:84532");
    assert_eq!(balance.balance, TokenAmount::from(1_500_000));
}

// ============================================================================
// Balance over JSON-RPC
// ============================================================================

#[derive(Clone, Copy)]
enum RpcReply {
    Ok,
    RpcError,
    ServerError,
    EmptyResult,
}

struct RpcNode {
    reply: RpcReply,
    calls: AtomicUsize,
}

async fn eth_call(State(node): State<Arc<RpcNode>>, Json(request): Json<Value>) -> Response {
    node.calls.fetch_add(1, Ordering::SeqCst);
    assert_eq!(request["method"], "eth_call");
    let call = &request["params"][0];
    assert_eq!(
        call["to"].as_str().unwrap().to_lowercase(),
        USDC_BASE_SEPOLIA.to_lowercase()
    );

    let id = request["id"].clone();
    let data = call["data"].as_str().unwrap();
    match node.reply {
        RpcReply::Ok => {
            let value: u64 = if data.starts_with("0x70a08231") { 1_500_000 } else { 6 };
            let result = format!("0x{value:064x}");
            Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
        }
        RpcReply::RpcError => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32000, "message": "execution reverted" }
        }))
        .into_response(),
        RpcReply::ServerError => (StatusCode::INTERNAL_SERVER_ERROR, "node down").into_response(),
        RpcReply::EmptyResult => {
            Json(json!({ "jsonrpc": "2.0", "id": id, "result": "0x" })).into_response()
        }
    }
}

async fn rpc_wallet(reply: RpcReply) -> (Wallet, Arc<RpcNode>) {
    let node = Arc::new(RpcNode {
        reply,
        calls: AtomicUsize::new(0),
    });
    let router = Router::new()
        .route("/", post(eth_call))
        .with_state(node.clone());
    let url = listen(router).await;
    let options = WalletOptions::default().network("eip155:84532").rpc_url(url);
    (create_wallet(KEY, options).unwrap(), node)
}

#[tokio::test]
async fn test_balance_over_json_rpc() {
    let (wallet, node) = rpc_wallet(RpcReply::Ok).await;

    let balance: Balance = wallet.get_balance().await.unwrap();
    assert_eq!(balance.formatted, "1.5");
    assert_eq!(node.calls.load(Ordering::SeqCst), 2);

    let serialized = serde_json::to_value(&balance).unwrap();
    assert_eq!(
        serialized,
        json!({
            "balance": "1500000",
            "formatted": "1.5",
            "currency": "USDC",
            "network": "eip155:84532"
        })
    );
    wallet.close();
}

#[tokio::test]
async fn test_balance_rpc_error_propagates() {
    let (wallet, node) = rpc_wallet(RpcReply::RpcError).await;

    let err = wallet.get_balance().await.unwrap_err();
    assert!(matches!(
        &err,
        WalletError::Chain(ChainError::Rpc { code: -32000, message }) if message == "execution reverted"
    ));
    // One attempt per read, never retried
    assert!(node.calls.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_balance_http_error_status() {
    let (wallet, _node) = rpc_wallet(RpcReply::ServerError).await;

    let err = wallet.get_balance().await.unwrap_err();
    match err {
        WalletError::Chain(ChainError::HttpStatus { status, body, .. }) => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "node down");
        }
        other => panic!("expected HTTP status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_balance_empty_return_data() {
    let (wallet, _node) = rpc_wallet(RpcReply::EmptyResult).await;

    assert!(matches!(
        wallet.get_balance().await,
        Err(WalletError::Chain(ChainError::InvalidReturnData { len: 0 }))
    ));
}

#[test]
fn test_unset_key_variable_fails_before_any_request() {
    let err = create_wallet_from_env(Some("X402_PAID_FETCH_TEST_NO_SUCH_KEY"), WalletOptions::default())
        .unwrap_err();
    assert!(err.is_configuration());
}
