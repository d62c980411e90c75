//! EIP-712 hashing and signing for EIP-3009 `TransferWithAuthorization`

use std::str::FromStr;

use alloy_primitives::{keccak256, Address, B256, U256};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{EvmSignature, Signer};
use crate::x402::types::{HexEncodedNonce, TokenAmount};
use crate::x402::UnixTimestamp;

static EIP712_DOMAIN_TYPE_HASH: Lazy<B256> = Lazy::new(|| {
    keccak256("EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)")
});

/// Type hash for TransferWithAuthorization (USDC FiatTokenV2 / EIP-3009)
static TRANSFER_WITH_AUTHORIZATION_TYPE_HASH: Lazy<B256> = Lazy::new(|| {
    keccak256("TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    /// Domain separator hash
    pub fn separator(&self) -> B256 {
        let mut encoded = Vec::with_capacity(160);
        encoded.extend_from_slice(EIP712_DOMAIN_TYPE_HASH.as_slice());
        encoded.extend_from_slice(keccak256(self.name.as_bytes()).as_slice());
        encoded.extend_from_slice(keccak256(self.version.as_bytes()).as_slice());
        encoded.extend_from_slice(&U256::from(self.chain_id).to_be_bytes::<32>());
        encoded.extend_from_slice(self.verifying_contract.into_word().as_slice());
        keccak256(&encoded)
    }
}

/// EIP-3009 TransferWithAuthorization message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferWithAuthorization {
    pub from: String,
    pub to: String,
    pub value: TokenAmount,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: HexEncodedNonce,
}

/// TransferWithAuthorization plus its EIP-712 signature; the `exact` EVM
/// scheme payload on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignedTransferWithAuthorization {
    pub signature: EvmSignature,
    pub authorization: TransferWithAuthorization,
}

impl TransferWithAuthorization {
    fn struct_hash(&self, from: &Address, to: &Address) -> B256 {
        let mut encoded = Vec::with_capacity(224);
        encoded.extend_from_slice(TRANSFER_WITH_AUTHORIZATION_TYPE_HASH.as_slice());
        encoded.extend_from_slice(from.into_word().as_slice());
        encoded.extend_from_slice(to.into_word().as_slice());
        encoded.extend_from_slice(&self.value.0.to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(self.valid_after.0).to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(self.valid_before.0).to_be_bytes::<32>());
        encoded.extend_from_slice(&self.nonce.0);
        keccak256(&encoded)
    }

    /// keccak256("\x19\x01" || domainSeparator || structHash)
    pub fn eip712_hash(&self, domain: &Eip712Domain) -> Result<B256, Eip712Error> {
        let from = Address::from_str(&self.from)
            .map_err(|_| Eip712Error::InvalidAddress(self.from.clone()))?;
        let to = Address::from_str(&self.to)
            .map_err(|_| Eip712Error::InvalidAddress(self.to.clone()))?;

        let mut encoded = Vec::with_capacity(66);
        encoded.extend_from_slice(b"\x19\x01");
        encoded.extend_from_slice(domain.separator().as_slice());
        encoded.extend_from_slice(self.struct_hash(&from, &to).as_slice());

        Ok(keccak256(&encoded))
    }

    pub async fn sign(
        &self,
        domain: &Eip712Domain,
        signer: &dyn Signer,
    ) -> Result<SignedTransferWithAuthorization, Eip712Error> {
        let hash = self.eip712_hash(domain)?;
        let signature = signer.sign_hash(&hash).await?;

        Ok(SignedTransferWithAuthorization {
            signature,
            authorization: self.clone(),
        })
    }
}

impl SignedTransferWithAuthorization {
    /// Recover the address that produced the signature
    pub fn recover_signer(&self, domain: &Eip712Domain) -> Result<Address, Eip712Error> {
        let hash = self.authorization.eip712_hash(domain)?;
        Ok(super::recover_address_from_signature(&self.signature, &hash)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Eip712Error {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Signer(#[from] super::SignerError),
}
