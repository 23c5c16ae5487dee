//! Recoverable signatures for AutoYield
//!
//! Validators never store public keys: they recover the signer address from
//! `r || s || v` and compare it to the address they were installed with.

use autoyield_types::Address;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::{address_of, CryptoError, CryptoResult};

/// Length of an `r || s || v` signature
pub const SIGNATURE_LEN: usize = 65;

/// Hash of a 32-byte digest under the personal-message prefix
pub fn eth_signed_message_hash(hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash);
    hasher.finalize().into()
}

/// Recover the address that signed `hash` (see [`crate::KeyPair::sign_hash`])
pub fn recover_signer(hash: &[u8; 32], signature: &[u8]) -> CryptoResult<Address> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::MalformedSignature(format!(
            "expected {} bytes, got {}",
            SIGNATURE_LEN,
            signature.len()
        )));
    }

    let v = signature[64];
    let recovery_byte = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => {
            return Err(CryptoError::MalformedSignature(format!(
                "invalid recovery byte {}",
                v
            )))
        }
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| CryptoError::MalformedSignature("invalid recovery id".to_string()))?;
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    let digest = eth_signed_message_hash(hash);
    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;

    Ok(address_of(&verifying_key))
}

/// Whether `signature` over `hash` was produced by `expected`
pub fn is_signed_by(hash: &[u8; 32], signature: &[u8], expected: &Address) -> bool {
    matches!(recover_signer(hash, signature), Ok(signer) if signer == *expected)
}
