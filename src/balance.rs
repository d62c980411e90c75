//! USDC balance of the wallet account

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::error::WalletError;
use crate::eth::usdc::USDC_SYMBOL;
use crate::eth::{ChainClient, ChainError, Erc20Call, USDC};
use crate::x402::TokenAmount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Raw amount in the token's smallest unit
    pub balance: TokenAmount,
    /// Human-readable amount, e.g. `"1.5"`
    pub formatted: String,
    pub currency: String,
    pub network: String,
}

/// Read the USDC balance of `owner` on `network`.
///
/// `balanceOf` and `decimals` are independent reads and run concurrently.
pub async fn read_balance(
    chain: &dyn ChainClient,
    owner: Address,
    network: &str,
) -> Result<Balance, WalletError> {
    let usdc = USDC::try_by_network_id(network)
        .ok_or_else(|| WalletError::UnsupportedNetwork(network.to_string()))?;
    let contract = usdc.address();

    let (raw, decimals) = tokio::try_join!(
        chain.read_contract(contract, Erc20Call::BalanceOf(owner)),
        chain.read_contract(contract, Erc20Call::Decimals),
    )?;
    if decimals > U256::from(u8::MAX) {
        return Err(ChainError::InvalidDecimals(decimals).into());
    }
    let decimals = decimals.to::<u8>();

    tracing::debug!(%owner, %network, %raw, decimals, "USDC balance");
    Ok(Balance {
        balance: TokenAmount(raw),
        formatted: format_units(raw, decimals),
        currency: USDC_SYMBOL.to_string(),
        network: network.to_string(),
    })
}

/// Render `value * 10^-decimals` in decimal, without trailing fractional zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let (integer, fraction) = if digits.len() > decimals {
        let (int, frac) = digits.split_at(digits.len() - decimals);
        (int.to_string(), frac.to_string())
    } else {
        ("0".to_string(), format!("{digits:0>decimals$}"))
    };

    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer
    } else {
        format!("{integer}.{fraction}")
    }
}
