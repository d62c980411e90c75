//! Ethereum account derivation and hash signing on top of k256
//!
//! Covers exactly what the wallet needs:
//! - private key normalization and parsing
//! - address derivation
//! - prehash signing (EIP-712 digests)

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, SigningKey, VerifyingKey};

use super::EvmSignature;

/// Canonical `0x`-prefixed form of a hex private key.
///
/// No validation happens here; malformed keys are rejected by [`EvmSigner`].
pub fn canonical_private_key(key: &str) -> String {
    if key.starts_with("0x") {
        key.to_string()
    } else {
        format!("0x{key}")
    }
}

/// An Ethereum account backed by a secp256k1 private key
#[derive(Clone)]
pub struct EvmSigner {
    key: SigningKey,
    /// Cached Ethereum address (derived from public key)
    address: Address,
}

impl EvmSigner {
    pub fn new(key: SigningKey) -> Self {
        let address = Self::derive_address(&key);
        Self { key, address }
    }

    /// Create a signer from raw bytes (32 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(bytes).map_err(|_| SignerError::InvalidKey)?;
        Ok(Self::new(key))
    }

    /// Normalize `key` to its `0x` form and derive the account from it
    pub fn from_private_key(key: &str) -> Result<Self, SignerError> {
        let canonical = canonical_private_key(key);
        let hex_digits = &canonical[2..];
        if hex_digits.len() != 64 {
            return Err(SignerError::InvalidLength(hex_digits.len()));
        }
        let bytes = hex::decode(hex_digits).map_err(|_| SignerError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    /// Get the Ethereum address for this signer
    pub fn address(&self) -> Address {
        self.address
    }

    fn derive_address(key: &SigningKey) -> Address {
        Self::address_from_verifying_key(key.verifying_key())
    }

    fn address_from_verifying_key(key: &VerifyingKey) -> Address {
        // Uncompressed public key is 0x04 || x || y; hash the 64 coordinate bytes
        let public_key = key.to_encoded_point(false);
        let hash = keccak256(&public_key.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }

    /// Sign a 32-byte hash, returning the 65-byte (r, s, v) Ethereum signature
    pub fn sign_hash_sync(&self, hash: &B256) -> Result<EvmSignature, SignerError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|_| SignerError::SigningFailed)?;

        let mut sig_bytes = [0u8; 65];
        sig_bytes[..64].copy_from_slice(&signature.to_bytes());
        // Ethereum uses v = 27 + recovery_id
        sig_bytes[64] = recovery_id.to_byte() + 27;

        Ok(EvmSignature::from(sig_bytes))
    }
}

impl FromStr for EvmSigner {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_private_key(s)
    }
}

impl fmt::Debug for EvmSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("Invalid private key")]
    InvalidKey,
    #[error("Invalid hex string")]
    InvalidHex,
    #[error("Invalid private key length: expected 64 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("Signing failed")]
    SigningFailed,
    #[error("Invalid signature format")]
    InvalidSignature,
    #[error("Signature recovery failed")]
    RecoveryFailed,
}

/// Recover the Ethereum address from a 65-byte signature and message hash
pub fn recover_address_from_signature(
    signature: &EvmSignature,
    hash: &B256,
) -> Result<Address, SignerError> {
    let sig_bytes = signature.0.as_slice();
    if sig_bytes.len() != 65 {
        return Err(SignerError::InvalidSignature);
    }

    let sig = k256::ecdsa::Signature::from_slice(&sig_bytes[..64])
        .map_err(|_| SignerError::InvalidSignature)?;

    let v = sig_bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recid = RecoveryId::from_byte(recovery_byte).ok_or(SignerError::RecoveryFailed)?;

    let recovered_key = VerifyingKey::recover_from_prehash(hash.as_slice(), &sig, recid)
        .map_err(|_| SignerError::RecoveryFailed)?;

    Ok(EvmSigner::address_from_verifying_key(&recovered_key))
}

/// Signing capability of an account
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    /// Sign a 32-byte hash
    async fn sign_hash(&self, hash: &B256) -> Result<EvmSignature, SignerError>;
}

#[async_trait::async_trait]
impl Signer for EvmSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_hash(&self, hash: &B256) -> Result<EvmSignature, SignerError> {
        self.sign_hash_sync(hash)
    }
}
