//! Operation validation
//!
//! Validation only reads state. Nonce consumption and fee charging happen in
//! the entry point once every check here has passed.

use autoyield_crypto::{is_signed_by, operation_hash, sponsor_digest};
use autoyield_types::{
    Address, Assets, AutoYieldError, Result, UserOperation, ValidationMode, ValidityWindow,
};
use serde::{Deserialize, Serialize};

use crate::{ChainState, EntryPointConfig};

/// Outcome of a successful validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub op_hash: [u8; 32],
    /// Who pays the fee: the sponsor if present, else the account
    pub payer: Address,
    pub max_cost: Assets,
    /// Window in which both the account and any sponsor accept the operation
    pub window: ValidityWindow,
    /// Identity whose signature authorized the operation
    pub authorizer: Address,
}

impl ValidationResult {
    pub fn op_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.op_hash))
    }
}

pub struct OperationValidator<'a> {
    state: &'a ChainState,
    config: &'a EntryPointConfig,
}

impl<'a> OperationValidator<'a> {
    pub fn new(state: &'a ChainState, config: &'a EntryPointConfig) -> Self {
        Self { state, config }
    }

    pub fn validate(&self, op: &UserOperation) -> Result<ValidationResult> {
        let account = self.state.account(&op.sender)?;

        if op.gas.max_fee_per_gas > self.config.max_fee_per_gas {
            return Err(AutoYieldError::GasPriceTooHigh {
                offered: op.gas.max_fee_per_gas,
                cap: self.config.max_fee_per_gas,
            });
        }
        let max_cost = op.gas.max_cost().ok_or(AutoYieldError::ArithmeticOverflow)?;

        let expected = self.state.nonce_of(&op.sender);
        if op.nonce != expected {
            return Err(AutoYieldError::InvalidNonce {
                expected,
                got: op.nonce,
            });
        }

        let op_hash = operation_hash(op, self.config.chain_id, &self.config.address)?;

        // Authorization
        let authorizer = match op.mode {
            ValidationMode::Root => {
                if !account.has_usable_root_validator() {
                    return Err(AutoYieldError::NoRootValidator {
                        account: op.sender,
                    });
                }
                let root = account.root_validator();
                account.modules().validate_with(&root, &op_hash, &op.signature)?;
                root
            }
            ValidationMode::Module(validator) => {
                account
                    .modules()
                    .validate_with(&validator, &op_hash, &op.signature)?;
                validator
            }
            ValidationMode::Automation => {
                let routing = account.routing();
                let token = op.action.automation_token().ok_or_else(|| {
                    AutoYieldError::AutomationScopeViolation {
                        action: op.action.name().to_string(),
                    }
                })?;
                let key = routing
                    .automation_key_for(&token)
                    .ok_or_else(|| AutoYieldError::Unauthorized {
                        reason: format!("no automation key routes token {}", token),
                    })?;
                if !is_signed_by(&op_hash, &op.signature, &key) {
                    return Err(AutoYieldError::InvalidSignature);
                }
                key
            }
        };

        // Sponsorship
        let mut window = op.window;
        let payer = match &op.sponsor {
            Some(sponsor) => {
                if !self.state.is_sponsor(&sponsor.sponsor) {
                    return Err(AutoYieldError::SponsorNotRegistered {
                        sponsor: sponsor.sponsor,
                    });
                }
                let digest = sponsor_digest(&sponsor.sponsor, &op_hash, &sponsor.window);
                if !is_signed_by(&digest, &sponsor.signature, &sponsor.sponsor) {
                    return Err(AutoYieldError::SponsorRejected {
                        reason: "approval not signed by sponsor for this operation".to_string(),
                    });
                }
                window = window.intersect(&sponsor.window);
                sponsor.sponsor
            }
            None => op.sender,
        };

        let now = self.state.timestamp();
        if window.is_not_yet_valid(now) {
            return Err(AutoYieldError::NotYetValid {
                valid_after: window.valid_after,
                now,
            });
        }
        if window.is_expired(now) {
            return Err(AutoYieldError::Expired {
                valid_until: window.valid_until,
                now,
            });
        }

        let available = self.state.deposit_of(&payer);
        if available < max_cost {
            return Err(AutoYieldError::InsufficientDeposit {
                payer,
                available,
                required: max_cost,
            });
        }

        Ok(ValidationResult {
            op_hash,
            payer,
            max_cost,
            window,
            authorizer,
        })
    }
}
