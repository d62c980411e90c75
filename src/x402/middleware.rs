//! reqwest middleware answering HTTP 402 with a single paid retry

use async_trait::async_trait;
use http::{Extensions, StatusCode};

use reqwest::{Client, ClientBuilder, Request, Response};
use reqwest_middleware as rqm;
use rqm::ClientWithMiddleware;

use super::client::X402Client;
use super::headers::{self, HeaderCodecError};
use super::scheme::SchemeError;
use super::types::{PaymentRequired, PaymentRequirements, X402Version};

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum X402PaymentsError {
    #[error("Request object is not cloneable. Are you passing a streaming body?")]
    RequestNotCloneable,
    #[error("Invalid PAYMENT-REQUIRED header")]
    PaymentRequiredHeader(#[source] HeaderCodecError),
    #[error("402 response body is not a payment request: {body}")]
    PaymentRequiredBody {
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("No payment option fits the payment policy ({} offered)", .payment_required.accepts.len())]
    PolicyRejection {
        payment_required: Box<PaymentRequired>,
        body: String,
    },
    #[error("No registered scheme for x402 v{version} accepts any of {} payment options", .accepts.len())]
    NoSuitablePaymentMethod {
        version: X402Version,
        accepts: Vec<PaymentRequirements>,
    },
    #[error("Failed to create payment payload")]
    Scheme(#[from] SchemeError),
    #[error("Failed to encode payment payload to HTTP header")]
    HeaderEncode(#[source] HeaderCodecError),
}

impl From<X402PaymentsError> for rqm::Error {
    fn from(error: X402PaymentsError) -> Self {
        rqm::Error::Middleware(error.into())
    }
}

// ============================================================================
// X402Payments middleware
// ============================================================================

/// Steps of one logical request. At most two requests reach the network.
enum PaymentState {
    Initial(Request),
    PaymentRequired {
        retry: Option<Request>,
        response: Response,
    },
    Retry(Request),
}

#[derive(Clone, Debug)]
pub struct X402Payments {
    client: X402Client,
}

impl X402Payments {
    pub fn new(client: X402Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &X402Client {
        &self.client
    }

    /// Decode the 402 offer: v2 carries it in `PAYMENT-REQUIRED`, v1 in the body.
    ///
    /// Returns the raw body alongside for error reporting.
    async fn read_payment_required(
        response: Response,
    ) -> rqm::Result<(PaymentRequired, String)> {
        let header = response.headers().get(headers::PAYMENT_REQUIRED).cloned();
        let body = response.text().await?;

        let required = match header {
            Some(value) => headers::decode_header::<PaymentRequired>(&value)
                .map_err(X402PaymentsError::PaymentRequiredHeader)?,
            None => serde_json::from_str::<PaymentRequired>(&body).map_err(|source| {
                X402PaymentsError::PaymentRequiredBody {
                    body: body.clone(),
                    source,
                }
            })?,
        };
        Ok((required, body))
    }

    /// Run the policies and sign; the returned request carries the payment header.
    ///
    /// A request that cannot be resent fails before anything is signed.
    async fn pay(
        &self,
        retry: Option<Request>,
        response: Response,
    ) -> rqm::Result<Request> {
        let mut request = retry.ok_or(X402PaymentsError::RequestNotCloneable)?;
        let url = response.url().clone();
        let (payment_required, body) = Self::read_payment_required(response).await?;
        tracing::debug!(
            %url,
            version = %payment_required.x402_version,
            offered = payment_required.accepts.len(),
            "Payment required"
        );

        let candidates = self.client.acceptable(&payment_required.accepts);
        if candidates.is_empty() {
            tracing::warn!(
                %url,
                offered = payment_required.accepts.len(),
                "No payment option fits the payment policy"
            );
            return Err(X402PaymentsError::PolicyRejection {
                payment_required: Box::new(payment_required),
                body,
            }
            .into());
        }

        let payload = self
            .client
            .create_payment_payload(&payment_required, &candidates)
            .await?;
        let header_value =
            headers::encode_header(&payload).map_err(X402PaymentsError::HeaderEncode)?;

        request.headers_mut().insert(
            headers::payment_header_name(payload.x402_version),
            header_value,
        );
        Ok(request)
    }
}

#[async_trait]
impl rqm::Middleware for X402Payments {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let mut state = PaymentState::Initial(req);
        loop {
            state = match state {
                PaymentState::Initial(req) => {
                    let retry = req.try_clone();
                    let res = next.clone().run(req, extensions).await?;
                    if res.status() != StatusCode::PAYMENT_REQUIRED {
                        return Ok(res);
                    }
                    PaymentState::PaymentRequired {
                        retry,
                        response: res,
                    }
                }
                PaymentState::PaymentRequired { retry, response } => {
                    PaymentState::Retry(self.pay(retry, response).await?)
                }
                PaymentState::Retry(req) => {
                    let res = next.clone().run(req, extensions).await?;
                    tracing::info!(
                        url = %res.url(),
                        status = %res.status(),
                        paid = headers::settlement_header(res.headers()).is_some(),
                        "Paid request completed"
                    );
                    return Ok(res);
                }
            };
        }
    }
}

// ============================================================================
// Builder extension traits
// ============================================================================

pub struct ReqwestWithPaymentsBuilder<A> {
    inner: A,
    x402: X402Payments,
}

pub trait ReqwestWithPaymentsBuild {
    type BuildResult;

    fn build(self) -> Self::BuildResult;
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client> {
    type BuildResult = ClientWithMiddleware;

    fn build(self) -> Self::BuildResult {
        rqm::ClientBuilder::new(self.inner).with(self.x402).build()
    }
}

impl ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder> {
    type BuildResult = Result<ClientWithMiddleware, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.x402).build())
    }
}

pub trait ReqwestWithPayments {
    type Inner;

    fn with_payments(self, x402: X402Client) -> ReqwestWithPaymentsBuilder<Self::Inner>;
}

impl ReqwestWithPayments for Client {
    type Inner = Client;

    fn with_payments(self, x402: X402Client) -> ReqwestWithPaymentsBuilder<Self::Inner> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402: X402Payments::new(x402),
        }
    }
}

impl ReqwestWithPayments for ClientBuilder {
    type Inner = ClientBuilder;

    fn with_payments(self, x402: X402Client) -> ReqwestWithPaymentsBuilder<Self::Inner> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402: X402Payments::new(x402),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use alloy_primitives::{Address, B256};
    use reqwest::{Method, Url};
    use serde_json::json;

    use super::*;
    use crate::eth::{EvmSignature, EvmSigner, Signer, SignerError};
    use crate::x402::types::TokenAmount;

    struct CountingSigner {
        inner: EvmSigner,
        signed: AtomicUsize,
    }

    #[async_trait]
    impl Signer for CountingSigner {
        fn address(&self) -> Address {
            self.inner.address()
        }

        async fn sign_hash(&self, hash: &B256) -> Result<EvmSignature, SignerError> {
            self.signed.fetch_add(1, Ordering::SeqCst);
            self.inner.sign_hash_sync(hash)
        }
    }

    fn counting_signer() -> Arc<CountingSigner> {
        Arc::new(CountingSigner {
            inner: EvmSigner::from_private_key(
                "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
            )
            .unwrap(),
            signed: AtomicUsize::new(0),
        })
    }

    fn payment_required_response() -> Response {
        let required = PaymentRequired {
            x402_version: X402Version::V2,
            error: None,
            resource: Some(json!({ "url": "http://localhost/paid" })),
            accepts: vec![PaymentRequirements {
                scheme: "exact".into(),
                network: "eip155:84532".into(),
                amount: TokenAmount::from(10_000),
                asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
                pay_to: "0x2222222222222222222222222222222222222222".into(),
                max_timeout_seconds: 60,
                extra: Some(json!({ "name": "USDC", "version": "2" })),
                resource: None,
                description: None,
                mime_type: None,
                output_schema: None,
            }],
            extensions: None,
        };
        let response = http::Response::builder()
            .status(StatusCode::PAYMENT_REQUIRED)
            .header(headers::PAYMENT_REQUIRED, headers::encode_header(&required).unwrap())
            .body("{}")
            .unwrap();
        Response::from(response)
    }

    #[tokio::test]
    async fn test_unresendable_request_is_never_signed() {
        let signer = counting_signer();
        let payments = X402Payments::new(X402Client::with_default_schemes(signer.clone()));

        let err = payments
            .pay(None, payment_required_response())
            .await
            .unwrap_err();

        let inner = match err {
            rqm::Error::Middleware(inner) => inner,
            other => panic!("expected a middleware error, got {other:?}"),
        };
        assert!(matches!(
            inner.downcast_ref::<X402PaymentsError>(),
            Some(X402PaymentsError::RequestNotCloneable)
        ));
        assert_eq!(signer.signed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_carries_payment_header() {
        let signer = counting_signer();
        let payments = X402Payments::new(X402Client::with_default_schemes(signer.clone()));
        let retry = Request::new(Method::GET, Url::parse("http://localhost/paid").unwrap());

        let request = payments
            .pay(Some(retry), payment_required_response())
            .await
            .unwrap();

        assert!(request.headers().contains_key(headers::PAYMENT_SIGNATURE));
        assert!(!request.headers().contains_key(headers::X_PAYMENT));
        assert_eq!(signer.signed.load(Ordering::SeqCst), 1);
    }
}
