//! AutoYield Crypto - Cryptographic primitives for the smart account
//!
//! This crate provides:
//! - secp256k1 key pairs with EVM-style addresses
//! - Recoverable signatures over 32-byte digests (personal-message prefixed)
//! - Keccak-256 hashing and the operation / sponsor approval digests
//!
//! # Security Invariant
//!
//! **A signature is only ever checked against a digest that binds the chain
//! id and entry point, so it cannot be replayed elsewhere.**

pub mod hash;
pub mod keys;
pub mod signature;

pub use hash::*;
pub use keys::*;
pub use signature::*;

use autoyield_types::AutoYieldError;
use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Signer recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for AutoYieldError {
    fn from(err: CryptoError) -> Self {
        match err {
            // A signature that does not decode or recover is simply a bad signature
            CryptoError::MalformedSignature(_) | CryptoError::RecoveryFailed(_) => {
                AutoYieldError::InvalidSignature
            }
            other => AutoYieldError::Crypto {
                message: other.to_string(),
            },
        }
    }
}
