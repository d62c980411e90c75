//! EVM network definitions keyed by chain ID, CAIP-2 identifier and legacy x402 names

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// CAIP-2 namespace for EVM chains
pub const EIP155_NAMESPACE: &str = "eip155";

/// Metadata for an Ethereum network
#[derive(Debug, Clone)]
pub struct NetworkInfo {
    /// The canonical network identifier
    pub network: Network,
    /// EVM chain ID
    pub chain_id: u64,
    /// Whether this is a testnet
    pub is_testnet: bool,
    /// Public RPC endpoint used when the wallet has no override
    pub default_rpc_url: Option<&'static str>,
    /// Legacy (x402 v1) names for this network, first is canonical
    pub names: &'static [&'static str],
}

// Single source of truth for the network table.
// Syntax: VariantName => (chain_id, is_testnet, default_rpc_url, [names...])
macro_rules! define_eth_networks {
    ($(
        $variant:ident => ($chain_id:expr, $is_testnet:expr, $rpc:expr, [$first_name:expr $(, $other_names:expr)* $(,)?])
    ),+ $(,)?) => {
        paste::paste! {
            /// Known EVM networks.
            #[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
            pub enum Network {
                $(
                    #[serde(rename = $first_name)]
                    $variant,
                )+
            }

            $(
                const [<$variant:upper _INFO>]: NetworkInfo = NetworkInfo {
                    network: Network::$variant,
                    chain_id: $chain_id,
                    is_testnet: $is_testnet,
                    default_rpc_url: $rpc,
                    names: &[$first_name $(, $other_names)*],
                };
            )+

            const NETWORK_REGISTRY: &[NetworkInfo] = &[
                $( [<$variant:upper _INFO>] ),+
            ];

            pub const ETH_NETWORKS: &[Network] = &[
                $( Network::$variant ),+
            ];

            impl Network {
                /// Get the metadata for this network
                pub fn info(&self) -> &'static NetworkInfo {
                    match self {
                        $( Network::$variant => &[<$variant:upper _INFO>] ),+
                    }
                }

                /// Return all known [`Network`] variants.
                pub fn variants() -> &'static [Network] {
                    ETH_NETWORKS
                }
            }
        }
    };
}

define_eth_networks! {
    // Wallet chain profiles (balance queries supported)
    Base             => (8453,      false, Some("https://mainnet.base.org"), ["base", "Base"]),
    BaseSepolia      => (84532,     true,  Some("https://sepolia.base.org"), ["base-sepolia", "BaseSepolia"]),

    // Networks a server may still offer under their v1 names
    Ethereum         => (1,         false, None, ["ethereum", "eth", "Ethereum"]),
    EthereumSepolia  => (11155111,  true,  None, ["ethereum-sepolia", "sepolia", "EthereumSepolia"]),
    Arbitrum         => (42161,     false, None, ["arbitrum", "Arbitrum"]),
    ArbitrumSepolia  => (421614,    true,  None, ["arbitrum-sepolia", "ArbitrumSepolia"]),
    Avalanche        => (43114,     false, None, ["avalanche", "Avalanche"]),
    AvalancheFuji    => (43113,     true,  None, ["avalanche-fuji", "AvalancheFuji"]),
    OpMainnet        => (10,        false, None, ["optimism", "op-mainnet", "OpMainnet"]),
    OpSepolia        => (11155420,  true,  None, ["optimism-sepolia", "op-sepolia", "OpSepolia"]),
    Polygon          => (137,       false, None, ["polygon", "Polygon"]),
    PolygonAmoy      => (80002,     true,  None, ["polygon-amoy", "PolygonAmoy"]),
}

impl Network {
    /// Get the EVM chain ID
    pub fn chain_id(&self) -> u64 {
        self.info().chain_id
    }

    /// Get all legacy names/aliases for this network
    pub fn names(&self) -> &'static [&'static str] {
        self.info().names
    }

    /// Get the primary legacy name (first in names array)
    pub fn name(&self) -> &'static str {
        self.info().names[0]
    }

    /// Check if this is a testnet
    pub fn is_testnet(&self) -> bool {
        self.info().is_testnet
    }

    /// Public RPC endpoint, if this network has a wallet chain profile
    pub fn default_rpc_url(&self) -> Option<&'static str> {
        self.info().default_rpc_url
    }

    /// CAIP-2 identifier, e.g. `eip155:8453`
    pub fn caip2(&self) -> String {
        format!("{}:{}", EIP155_NAMESPACE, self.chain_id())
    }

    /// Parse a network identifier: CAIP-2 (`eip155:8453`) or a legacy name
    /// (case-insensitive).
    pub fn parse(s: &str) -> Option<Network> {
        if let Some(chain_id) = parse_eip155_chain_id(s) {
            return Self::from_chain_id(chain_id);
        }
        let s_lower = s.to_lowercase();
        NETWORK_REGISTRY.iter().find_map(|info| {
            info.names
                .iter()
                .any(|name| name.to_lowercase() == s_lower)
                .then_some(info.network)
        })
    }

    /// Parse a network by chain ID
    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        NETWORK_REGISTRY
            .iter()
            .find(|info| info.chain_id == chain_id)
            .map(|info| info.network)
    }
}

/// Extract the chain ID from a CAIP-2 `eip155:<id>` identifier.
pub fn parse_eip155_chain_id(s: &str) -> Option<u64> {
    let (namespace, reference) = s.trim().split_once(':')?;
    if namespace != EIP155_NAMESPACE {
        return None;
    }
    reference.parse().ok()
}

/// Resolve any network identifier an x402 server may send to an EVM chain ID.
///
/// CAIP-2 identifiers resolve even for chains missing from the table.
pub fn chain_id_for(network: &str) -> Option<u64> {
    parse_eip155_chain_id(network).or_else(|| Network::parse(network).map(|n| n.chain_id()))
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.caip2())
    }
}
