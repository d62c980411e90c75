use reqwest_middleware as rqm;

use crate::eth::{ChainError, SignerError};
use crate::x402::{PaymentRequired, X402PaymentsError};

/// Errors surfaced by the wallet facade
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Missing or invalid key, network or endpoint. Raised before any network activity.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every offered payment option exceeded the payment policy; nothing was signed
    #[error("Payment rejected by policy: none of {} payment options is acceptable", .payment_required.accepts.len())]
    PolicyRejection {
        payment_required: Box<PaymentRequired>,
        /// Raw body of the 402 response
        body: String,
    },

    /// Payment negotiation or signing failed
    #[error("Payment failed: {0}")]
    Payment(#[source] X402PaymentsError),

    #[error("Transport error: {0}")]
    Transport(#[source] rqm::Error),

    #[error("unsupported network for balance query: {0}")]
    UnsupportedNetwork(String),

    #[error("Chain query failed: {0}")]
    Chain(#[from] ChainError),
}

impl From<SignerError> for WalletError {
    fn from(error: SignerError) -> Self {
        WalletError::Configuration(format!("invalid private key: {error}"))
    }
}

impl From<X402PaymentsError> for WalletError {
    fn from(error: X402PaymentsError) -> Self {
        match error {
            X402PaymentsError::PolicyRejection {
                payment_required,
                body,
            } => WalletError::PolicyRejection {
                payment_required,
                body,
            },
            other => WalletError::Payment(other),
        }
    }
}

/// Recover protocol errors the middleware carried through reqwest-middleware
impl From<rqm::Error> for WalletError {
    fn from(error: rqm::Error) -> Self {
        match error {
            rqm::Error::Middleware(inner) => match inner.downcast::<X402PaymentsError>() {
                Ok(payment) => payment.into(),
                Err(other) => WalletError::Transport(rqm::Error::Middleware(other)),
            },
            transport => WalletError::Transport(transport),
        }
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        WalletError::Transport(rqm::Error::Reqwest(error))
    }
}

impl WalletError {
    pub fn is_policy_rejection(&self) -> bool {
        matches!(self, WalletError::PolicyRejection { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, WalletError::Configuration(_))
    }
}
