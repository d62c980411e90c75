use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use reqwest_middleware::ClientWithMiddleware;

use crate::eth::{Network, Signer};

use super::middleware::{ReqwestWithPayments, ReqwestWithPaymentsBuild, X402PaymentsError};
use super::policy::{apply_policies, SharedPolicy};
use super::scheme::{ExactEvmScheme, NetworkPattern, SchemeClient, SchemeRegistration};
use super::types::{PaymentPayload, PaymentRequired, PaymentRequirements, X402Version};

/// Protocol client: owns the account, the registered scheme clients and the
/// payment policies, and turns a 402 into a signed [`PaymentPayload`].
#[derive(Clone)]
pub struct X402Client {
    signer: Arc<dyn Signer>,
    registrations: Vec<SchemeRegistration>,
    policies: Vec<SharedPolicy>,
}

impl X402Client {
    /// A client with no scheme registrations and no policies
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer,
            registrations: Vec::new(),
            policies: Vec::new(),
        }
    }

    /// `exact` EVM for v2 on `eip155:*` and for v1 on every known legacy
    /// network name
    pub fn with_default_schemes(signer: Arc<dyn Signer>) -> Self {
        let exact: Arc<dyn SchemeClient> = Arc::new(ExactEvmScheme);
        let mut client = Self::new(signer).register(SchemeRegistration::new(
            X402Version::V2,
            NetworkPattern::parse("eip155:*"),
            exact.clone(),
        ));
        for network in Network::variants() {
            for name in network.names() {
                client = client.register(SchemeRegistration::new(
                    X402Version::V1,
                    NetworkPattern::Exact((*name).to_string()),
                    exact.clone(),
                ));
            }
        }
        client
    }

    pub fn register(mut self, registration: SchemeRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn with_policy(mut self, policy: SharedPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn policies(&self) -> &[SharedPolicy] {
        &self.policies
    }

    pub fn registrations(&self) -> &[SchemeRegistration] {
        &self.registrations
    }

    /// Requirements that survive every policy, in server order
    pub fn acceptable(&self, requirements: &[PaymentRequirements]) -> Vec<PaymentRequirements> {
        apply_policies(&self.policies, requirements)
    }

    pub fn registration_for(
        &self,
        version: X402Version,
        requirements: &PaymentRequirements,
    ) -> Option<&SchemeRegistration> {
        self.registrations
            .iter()
            .find(|registration| registration.handles(version, requirements))
    }

    /// Sign a payment for the first candidate that has a registered scheme.
    ///
    /// `candidates` are expected to be policy-filtered already.
    pub async fn create_payment_payload(
        &self,
        required: &PaymentRequired,
        candidates: &[PaymentRequirements],
    ) -> Result<PaymentPayload, X402PaymentsError> {
        let version = required.x402_version;
        let (selected, registration) = candidates
            .iter()
            .find_map(|req| self.registration_for(version, req).map(|reg| (req, reg)))
            .ok_or_else(|| X402PaymentsError::NoSuitablePaymentMethod {
                version,
                accepts: candidates.to_vec(),
            })?;

        tracing::debug!(
            %version,
            scheme = %selected.scheme,
            network = %selected.network,
            amount = %selected.amount,
            "Selected payment requirement"
        );

        let payload = registration
            .client
            .create_payment_payload(self.signer.as_ref(), selected)
            .await?;

        Ok(match version {
            X402Version::V1 => PaymentPayload::v1(selected, payload),
            X402Version::V2 => PaymentPayload::v2(required, selected, payload),
        })
    }
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("address", &self.signer.address())
            .field("registrations", &self.registrations)
            .field("policies", &self.policies.len())
            .finish()
    }
}

/// Optional HTTP client configuration
#[derive(Default, Clone, Debug)]
pub struct ClientConfig {
    /// Connection timeout
    pub connect_timeout: Option<Duration>,
    /// Total request timeout
    pub timeout: Option<Duration>,
}

/// Create an HTTP client that answers 402 responses through `x402`
pub fn x402_client(
    x402: X402Client,
    config: &ClientConfig,
) -> Result<ClientWithMiddleware, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(connect_timeout) = config.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    builder.with_payments(x402).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::EvmSigner;
    use crate::x402::policy::{MaxPaymentPolicy, PolicyConfig};
    use crate::x402::types::TokenAmount;
    use serde_json::json;

    const KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn signer() -> Arc<dyn Signer> {
        Arc::new(EvmSigner::from_private_key(KEY).unwrap())
    }

    fn offer(scheme: &str, network: &str, amount: u64) -> PaymentRequirements {
        PaymentRequirements {
            scheme: scheme.into(),
            network: network.into(),
            amount: TokenAmount::from(amount),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            pay_to: "0x2222222222222222222222222222222222222222".into(),
            max_timeout_seconds: 60,
            extra: Some(json!({ "name": "USDC", "version": "2" })),
            resource: None,
            description: None,
            mime_type: None,
            output_schema: None,
        }
    }

    fn required(version: X402Version, accepts: Vec<PaymentRequirements>) -> PaymentRequired {
        PaymentRequired {
            x402_version: version,
            error: None,
            resource: Some(json!({ "url": "https://api.example.com/data" })),
            accepts,
            extensions: None,
        }
    }

    #[test]
    fn test_default_registrations() {
        let client = X402Client::with_default_schemes(signer());
        let v2 = offer("exact", "eip155:84532", 1);
        let v1 = offer("exact", "base-sepolia", 1);
        assert!(client.registration_for(X402Version::V2, &v2).is_some());
        assert!(client.registration_for(X402Version::V1, &v1).is_some());
        // Legacy names are not v2 networks and CAIP-2 is not a v1 name
        assert!(client.registration_for(X402Version::V2, &v1).is_none());
        assert!(client.registration_for(X402Version::V1, &v2).is_none());
        assert!(client
            .registration_for(X402Version::V2, &offer("upto", "eip155:84532", 1))
            .is_none());
    }

    #[test]
    fn test_acceptable_applies_policies() {
        let client = X402Client::with_default_schemes(signer()).with_policy(Arc::new(
            MaxPaymentPolicy::new(PolicyConfig::default().with_max_payment(Some(50))),
        ));
        let offers = vec![
            offer("exact", "eip155:84532", 600_000),
            offer("exact", "eip155:84532", 400_000),
        ];
        let kept = client.acceptable(&offers);
        assert_eq!(kept, vec![offers[1].clone()]);
    }

    #[tokio::test]
    async fn test_skips_unregistered_scheme() {
        let client = X402Client::with_default_schemes(signer());
        let accepts = vec![
            offer("upto", "eip155:84532", 1),
            offer("exact", "eip155:84532", 2),
        ];
        let req = required(X402Version::V2, accepts.clone());

        let payload = client.create_payment_payload(&req, &accepts).await.unwrap();
        assert_eq!(payload.x402_version, X402Version::V2);
        assert_eq!(payload.accepted.as_ref().unwrap().amount, TokenAmount::from(2));
        assert_eq!(payload.resource, req.resource);
        assert_eq!(
            payload.payload["authorization"]["from"],
            client.address().to_string()
        );
    }

    #[tokio::test]
    async fn test_v1_envelope() {
        let client = X402Client::with_default_schemes(signer());
        let accepts = vec![offer("exact", "base-sepolia", 5)];
        let req = required(X402Version::V1, accepts.clone());

        let payload = client.create_payment_payload(&req, &accepts).await.unwrap();
        assert_eq!(payload.scheme.as_deref(), Some("exact"));
        assert_eq!(payload.network.as_deref(), Some("base-sepolia"));
        assert!(payload.accepted.is_none());
    }

    #[tokio::test]
    async fn test_no_registered_scheme() {
        let client = X402Client::new(signer());
        let accepts = vec![offer("exact", "eip155:84532", 1)];
        let err = client
            .create_payment_payload(&required(X402Version::V2, accepts.clone()), &accepts)
            .await
            .unwrap_err();
        assert!(matches!(err, X402PaymentsError::NoSuitablePaymentMethod { .. }));
    }
}
