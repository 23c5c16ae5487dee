//! Key management for AutoYield
//!
//! Owners, automation keys and sponsors all sign with secp256k1 keys and are
//! identified by the EVM address of their public key.

use autoyield_types::Address;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint as _;
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};

use crate::{eth_signed_message_hash, CryptoError, CryptoResult};

/// A secp256k1 key pair
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Create from existing secret key bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> CryptoResult<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Derive a key deterministically from seed material
    pub fn from_seed(seed: &[u8]) -> CryptoResult<Self> {
        let material = blake3::derive_key("autoyield secp256k1 signing key v1", seed);
        SigningKey::from_slice(&material)
            .map(Self::from_signing_key)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))
    }

    /// Deterministic key for a named demo participant ("alice", "sponsor", ...)
    pub fn for_label(label: &str) -> CryptoResult<Self> {
        Self::from_seed(label.as_bytes())
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// The EVM address of this key
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the secret key bytes (for secure storage only!)
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Sign a 32-byte digest as a personal message.
    ///
    /// Returns 65 bytes `r || s || v` with `v` in {27, 28}.
    pub fn sign_hash(&self, hash: &[u8; 32]) -> CryptoResult<Vec<u8>> {
        let digest = eth_signed_message_hash(hash);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(27 + recovery_id.to_byte());
        Ok(bytes)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// EVM address of a public key: last 20 bytes of keccak(uncompressed point without prefix)
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let point = verifying_key.to_encoded_point(false);
    let digest: [u8; 32] = Keccak256::digest(&point.as_bytes()[1..]).into();
    Address::from_digest(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.address(), b.address());
        assert!(!a.address().is_zero());
    }

    #[test]
    fn test_keypair_from_bytes() {
        let keypair1 = KeyPair::generate();
        let keypair2 = KeyPair::from_bytes(&keypair1.secret_bytes()).unwrap();
        assert_eq!(keypair1.address(), keypair2.address());
    }

    #[test]
    fn test_label_keys_are_deterministic() {
        let a1 = KeyPair::for_label("alice").unwrap();
        let a2 = KeyPair::for_label("alice").unwrap();
        let b = KeyPair::for_label("bob").unwrap();
        assert_eq!(a1.address(), a2.address());
        assert_ne!(a1.address(), b.address());
    }

    #[test]
    fn test_known_address() {
        // Secret key 1 maps to the well-known generator-point address
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let keypair = KeyPair::from_bytes(&secret).unwrap();
        assert_eq!(
            keypair.address().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_zero_secret_rejected() {
        assert!(KeyPair::from_bytes(&[0u8; 32]).is_err());
    }
}
