//! x402 payment protocol, client side
//!
//! - Wire types for protocol versions 1 and 2
//! - Payment policies filtering offered requirements
//! - Scheme clients producing signed payloads
//! - reqwest middleware performing the 402 negotiation

pub mod client;
pub mod headers;
pub mod middleware;
pub mod policy;
pub mod scheme;
pub mod timestamp;
pub mod types;

pub use client::{x402_client, ClientConfig, X402Client};
pub use middleware::{X402Payments, X402PaymentsError};
pub use policy::{
    apply_policies, MaxPaymentPolicy, NetworkAllowList, PaymentPolicy, PolicyConfig, SharedPolicy,
};
pub use scheme::{ExactEvmScheme, NetworkPattern, SchemeClient, SchemeError, SchemeRegistration};
pub use timestamp::UnixTimestamp;
pub use types::{
    PaymentPayload, PaymentRequired, PaymentRequirements, SettlementResponse, TokenAmount,
    X402Version,
};
