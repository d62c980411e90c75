use std::collections::HashMap;

use alloy_primitives::{address, Address};
use once_cell::sync::Lazy;

use super::Network;

/// Currency label reported by balance queries
pub const USDC_SYMBOL: &str = "USDC";

/// EIP-712 domain parameters of a token contract
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenEip712 {
    pub name: String,
    pub version: String,
}

/// A token contract deployed on one network
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenDeployment {
    pub network: Network,
    pub address: Address,
    pub decimals: u8,
    pub eip712: TokenEip712,
}

// Testnets use "USDC" for the EIP-712 domain name, mainnets use "USD Coin"
const DEPLOYMENTS: &[(Network, Address, &str)] = &[
    (Network::Base, address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"), "USD Coin"),
    (Network::BaseSepolia, address!("036CbD53842c5426634e7929541eC2318f3dCF7e"), "USDC"),
];

static USDC_BY_NETWORK: Lazy<HashMap<Network, USDC>> = Lazy::new(|| {
    DEPLOYMENTS
        .iter()
        .map(|(network, address, name)| {
            let deployment = TokenDeployment {
                network: *network,
                address: *address,
                decimals: 6,
                eip712: TokenEip712 {
                    name: (*name).into(),
                    version: "2".into(),
                },
            };
            (*network, USDC(deployment))
        })
        .collect()
});

/// A known USDC deployment as a wrapper around [`TokenDeployment`].
#[derive(Clone, Debug)]
pub struct USDC(pub TokenDeployment);

impl USDC {
    /// Try to get the USDC deployment for a given network.
    pub fn try_by_network(network: Network) -> Option<&'static Self> {
        USDC_BY_NETWORK.get(&network)
    }

    /// Resolve a network identifier string (CAIP-2 or legacy name)
    pub fn try_by_network_id(network: &str) -> Option<&'static Self> {
        Network::parse(network).and_then(Self::try_by_network)
    }

    /// Find the deployment at `address` on the chain with `chain_id`
    pub fn try_by_chain_and_address(chain_id: u64, address: &Address) -> Option<&'static Self> {
        Network::from_chain_id(chain_id)
            .and_then(Self::try_by_network)
            .filter(|usdc| usdc.0.address == *address)
    }

    /// Check if USDC is deployed on the given network
    pub fn is_supported(network: Network) -> bool {
        Self::try_by_network(network).is_some()
    }

    /// Get all networks where USDC is deployed
    pub fn supported_networks() -> Vec<Network> {
        Network::variants()
            .iter()
            .copied()
            .filter(|&network| Self::is_supported(network))
            .collect()
    }

    pub fn address(&self) -> Address {
        self.0.address
    }

    pub fn decimals(&self) -> u8 {
        self.0.decimals
    }
}
