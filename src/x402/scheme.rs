//! Scheme clients: turn a selected payment requirement into a signed payload

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTimeError;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::Value;

use crate::eth::eip712::{Eip712Domain, Eip712Error, TransferWithAuthorization};
use crate::eth::{Signer, USDC};
use crate::x402::UnixTimestamp;
use crate::x402::types::{HexEncodedNonce, PaymentRequirements, X402Version};

pub const EXACT_SCHEME: &str = "exact";

// ============================================================================
// Network patterns
// ============================================================================

/// Matches the `network` field of payment requirements.
///
/// - `eip155:8453` or `base-sepolia`: exact (case-insensitive)
/// - `eip155:*`: any reference in the namespace
/// - `eip155:{8453,84532}`: any reference from the set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkPattern {
    Exact(String),
    Wildcard { namespace: String },
    Set { namespace: String, references: Vec<String> },
}

impl NetworkPattern {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some((namespace, reference)) = s.split_once(':') {
            if reference == "*" {
                return NetworkPattern::Wildcard {
                    namespace: namespace.to_string(),
                };
            }
            if let Some(inner) = reference.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
                let references = inner
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(ToOwned::to_owned)
                    .collect();
                return NetworkPattern::Set {
                    namespace: namespace.to_string(),
                    references,
                };
            }
        }
        NetworkPattern::Exact(s.to_string())
    }

    pub fn matches(&self, network: &str) -> bool {
        match self {
            NetworkPattern::Exact(exact) => exact.eq_ignore_ascii_case(network),
            NetworkPattern::Wildcard { namespace } => network
                .split_once(':')
                .is_some_and(|(ns, reference)| ns == namespace && !reference.is_empty()),
            NetworkPattern::Set {
                namespace,
                references,
            } => network.split_once(':').is_some_and(|(ns, reference)| {
                ns == namespace && references.iter().any(|r| r == reference)
            }),
        }
    }
}

impl FromStr for NetworkPattern {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NetworkPattern::parse(s))
    }
}

impl Display for NetworkPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NetworkPattern::Exact(exact) => write!(f, "{exact}"),
            NetworkPattern::Wildcard { namespace } => write!(f, "{namespace}:*"),
            NetworkPattern::Set {
                namespace,
                references,
            } => write!(f, "{namespace}:{{{}}}", references.join(",")),
        }
    }
}

// ============================================================================
// Scheme client
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    #[error("Network {0} has no EVM chain id")]
    UnsupportedNetwork(String),
    #[error("Invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("No EIP-712 domain for asset {asset} on chain {chain_id}")]
    MissingEip712Domain { asset: String, chain_id: u64 },
    #[error("Failed to get system clock")]
    Clock(#[source] SystemTimeError),
    #[error("Failed to sign authorization")]
    Eip712(#[from] Eip712Error),
    #[error("Failed to encode payment payload to json")]
    JsonEncode(#[source] serde_json::Error),
}

/// Produces the scheme-specific `payload` of a [`PaymentPayload`](super::types::PaymentPayload)
#[async_trait]
pub trait SchemeClient: Send + Sync {
    /// Scheme name matched against `PaymentRequirements::scheme`
    fn scheme(&self) -> &str;

    async fn create_payment_payload(
        &self,
        signer: &dyn Signer,
        requirements: &PaymentRequirements,
    ) -> Result<Value, SchemeError>;
}

/// Binds a scheme client to a protocol version and a set of networks
#[derive(Clone)]
pub struct SchemeRegistration {
    pub version: X402Version,
    pub network: NetworkPattern,
    pub client: Arc<dyn SchemeClient>,
}

impl SchemeRegistration {
    pub fn new(version: X402Version, network: NetworkPattern, client: Arc<dyn SchemeClient>) -> Self {
        Self {
            version,
            network,
            client,
        }
    }

    pub fn handles(&self, version: X402Version, requirements: &PaymentRequirements) -> bool {
        self.version == version
            && self.network.matches(&requirements.network)
            && self.client.scheme() == requirements.scheme
    }
}

impl fmt::Debug for SchemeRegistration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistration")
            .field("version", &self.version)
            .field("network", &self.network.to_string())
            .field("scheme", &self.client.scheme())
            .finish()
    }
}

// ============================================================================
// exact / EVM (EIP-3009)
// ============================================================================

/// Validity window used when a server omits `maxTimeoutSeconds`
const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;
/// Backdating of `validAfter` to absorb clock skew
const VALID_AFTER_SKEW_SECONDS: u64 = 10 * 60;

/// `exact` scheme on EVM chains: an EIP-3009 `TransferWithAuthorization`
/// signed over EIP-712.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactEvmScheme;

impl ExactEvmScheme {
    fn domain(
        requirements: &PaymentRequirements,
        chain_id: u64,
        asset: Address,
    ) -> Result<Eip712Domain, SchemeError> {
        let (name, version) = requirements
            .eip712_name_version()
            .or_else(|| {
                USDC::try_by_chain_and_address(chain_id, &asset).map(|usdc| {
                    (usdc.0.eip712.name.clone(), usdc.0.eip712.version.clone())
                })
            })
            .ok_or_else(|| SchemeError::MissingEip712Domain {
                asset: requirements.asset.clone(),
                chain_id,
            })?;

        Ok(Eip712Domain {
            name,
            version,
            chain_id,
            verifying_contract: asset,
        })
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, SchemeError> {
    Address::from_str(value).map_err(|_| SchemeError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

#[async_trait]
impl SchemeClient for ExactEvmScheme {
    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }

    async fn create_payment_payload(
        &self,
        signer: &dyn Signer,
        requirements: &PaymentRequirements,
    ) -> Result<Value, SchemeError> {
        let chain_id = requirements
            .chain_id()
            .ok_or_else(|| SchemeError::UnsupportedNetwork(requirements.network.clone()))?;
        let asset = parse_address("asset", &requirements.asset)?;
        let pay_to = parse_address("payTo", &requirements.pay_to)?;
        let domain = Self::domain(requirements, chain_id, asset)?;

        let timeout = match requirements.max_timeout_seconds {
            0 => DEFAULT_MAX_TIMEOUT_SECONDS,
            secs => secs,
        };
        let now = UnixTimestamp::try_now().map_err(SchemeError::Clock)?;
        let valid_after =
            UnixTimestamp(now.seconds_since_epoch().saturating_sub(VALID_AFTER_SKEW_SECONDS));
        let valid_before = now + timeout;

        let authorization = TransferWithAuthorization {
            from: signer.address().to_string(),
            to: pay_to.to_string(),
            value: requirements.amount,
            valid_after,
            valid_before,
            nonce: HexEncodedNonce::random(),
        };

        tracing::debug!(
            chain_id,
            asset = %asset,
            pay_to = %pay_to,
            amount = %requirements.amount,
            "Signing TransferWithAuthorization"
        );
        let signed = authorization.sign(&domain, signer).await?;
        serde_json::to_value(&signed).map_err(SchemeError::JsonEncode)
    }
}
