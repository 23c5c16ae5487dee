//! Client-side helpers for signing operations

use autoyield_crypto::{operation_hash, sponsor_digest, KeyPair};
use autoyield_types::{Result, SponsorPayload, UserOperation, ValidityWindow};

use crate::EntryPointConfig;

/// Attach a sponsor approval to `op`.
///
/// Call before [`sign_operation`]: the operation hash commits to the sponsor
/// address.
pub fn sponsor_operation(
    op: &mut UserOperation,
    sponsor: &KeyPair,
    window: ValidityWindow,
    config: &EntryPointConfig,
) -> Result<()> {
    op.sponsor = Some(SponsorPayload {
        sponsor: sponsor.address(),
        window,
        signature: Vec::new(),
    });
    let op_hash = operation_hash(op, config.chain_id, &config.address)?;
    let digest = sponsor_digest(&sponsor.address(), &op_hash, &window);
    let signature = sponsor.sign_hash(&digest)?;
    if let Some(payload) = op.sponsor.as_mut() {
        payload.signature = signature;
    }
    Ok(())
}

/// Sign `op` with `signer` (owner, module validator key or automation key)
pub fn sign_operation(op: &mut UserOperation, signer: &KeyPair, config: &EntryPointConfig) -> Result<()> {
    let op_hash = operation_hash(op, config.chain_id, &config.address)?;
    op.signature = signer.sign_hash(&op_hash)?;
    Ok(())
}
