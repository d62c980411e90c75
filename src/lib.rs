//! Pay-per-request HTTP client for x402 payment-gated APIs
//!
//! A [`Wallet`] holds one EVM account. Requests made through it answer
//! HTTP 402 challenges by signing a USDC transfer authorization (subject to
//! the configured payment policy) and retrying once with the payment header.
//!
//! ```no_run
//! # async fn demo() -> Result<(), x402_wallet::WalletError> {
//! use x402_wallet::{create_wallet_from_env, WalletOptions};
//!
//! let wallet = create_wallet_from_env(None, WalletOptions::default().max_payment(50))?;
//! let response = wallet.get("https://api.example.com/report", Default::default()).await?;
//! println!("paid={} data={}", response.paid, response.data);
//! # Ok(())
//! # }
//! ```

pub mod balance;
pub mod cli;
pub mod config;
pub mod error;
pub mod eth;
pub mod logging;
pub mod wallet;
pub mod x402;

pub use balance::{format_units, Balance};
pub use config::{WalletConfig, WalletOptions, DEFAULT_NETWORK};
pub use error::WalletError;
pub use wallet::{
    create_paid_fetch, create_wallet, create_wallet_from_env, PaidResponse, RequestInit, Wallet,
    DEFAULT_KEY_ENV,
};
