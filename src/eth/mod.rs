pub mod eip712;

pub mod network;
pub use network::Network;

pub mod usdc;
pub use usdc::USDC;

pub mod rpc;
pub use rpc::{ChainClient, ChainError, Erc20Call, JsonRpcChainClient};

pub mod signer;
pub use signer::{canonical_private_key, recover_address_from_signature, EvmSigner, Signer, SignerError};
pub use eip712::{Eip712Domain, TransferWithAuthorization};

use std::fmt;
use std::fmt::Debug;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// EVM Signature
// ============================================================================

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EvmSignature(pub Vec<u8>);

impl From<[u8; 65]> for EvmSignature {
    fn from(bytes: [u8; 65]) -> Self {
        EvmSignature(bytes.to_vec())
    }
}

impl EvmSignature {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl Debug for EvmSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmSignature({})", self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EvmSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|_| serde::de::Error::custom("Failed to decode EVM signature"))?;
        Ok(EvmSignature(bytes))
    }
}

impl Serialize for EvmSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}
