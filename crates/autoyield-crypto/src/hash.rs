//! Hashing utilities for AutoYield

use autoyield_types::{Address, Result, UserOperation, ValidityWindow};
use sha3::{Digest, Keccak256};

/// Compute Keccak-256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Compute hash of multiple items
pub fn hash_all(items: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for item in items {
        hasher.update(item);
    }
    hasher.finalize().into()
}

/// Hash identifying an operation on one chain and entry point.
///
/// Excludes both the account signature and the sponsor signature.
pub fn operation_hash(op: &UserOperation, chain_id: u64, entry_point: &Address) -> Result<[u8; 32]> {
    Ok(keccak256(&op.hash_preimage(chain_id, entry_point)?))
}

/// Digest a sponsor signs to approve paying for `op_hash` within `window`
pub fn sponsor_digest(sponsor: &Address, op_hash: &[u8; 32], window: &ValidityWindow) -> [u8; 32] {
    hash_all(&[
        b"autoyield.sponsor.v1",
        sponsor.as_bytes(),
        op_hash,
        &window.valid_after.to_be_bytes(),
        &window.valid_until.to_be_bytes(),
    ])
}

/// Deterministic address for `(deployer, salt)` style derivations
pub fn derive_address(domain: &str, parts: &[&[u8]]) -> Address {
    let mut hasher = Keccak256::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update(part);
    }
    let digest: [u8; 32] = hasher.finalize().into();
    Address::from_digest(&digest)
}
