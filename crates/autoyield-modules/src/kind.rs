//! Module variants and their capability interface

use std::collections::BTreeSet;

use autoyield_crypto::is_signed_by;
use autoyield_types::{Address, Assets, AutoYieldError, Call, ModuleType, Result, Selector};
use serde::{Deserialize, Serialize};

use crate::{decode_owner, decode_spending_cap, decode_tokens};

/// `onERC721Received(address,address,uint256,bytes)`
pub const ON_ERC721_RECEIVED: Selector = [0x15, 0x0b, 0x7a, 0x02];
/// `onERC1155Received(address,address,uint256,uint256,bytes)`
pub const ON_ERC1155_RECEIVED: Selector = [0xf2, 0x3a, 0x6e, 0x61];
/// `onERC1155BatchReceived(address,address,uint256[],uint256[],bytes)`
pub const ON_ERC1155_BATCH_RECEIVED: Selector = [0xbc, 0x19, 0x7c, 0x81];

/// The deployable module implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Authorizes operations signed by a single secp256k1 owner
    EcdsaValidator,
    /// Lets anyone trigger threshold rebalancing for a fixed token list
    RebalanceExecutor,
    /// Answers token receiver callbacks
    TokenReceiverFallback,
    /// Caps the amount a single call may debit, counts executed calls
    SpendingCapHook,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 4] = [
        ModuleKind::EcdsaValidator,
        ModuleKind::RebalanceExecutor,
        ModuleKind::TokenReceiverFallback,
        ModuleKind::SpendingCapHook,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EcdsaValidator => "ecdsa-validator",
            Self::RebalanceExecutor => "rebalance-executor",
            Self::TokenReceiverFallback => "token-receiver-fallback",
            Self::SpendingCapHook => "spending-cap-hook",
        }
    }

    /// Address at which the default catalog deploys this module
    pub fn canonical_address(&self) -> Address {
        Address::from_label(&format!("autoyield.module.{}", self.name()))
    }

    /// Capability query: may this module be installed as `module_type`?
    pub fn supports(&self, module_type: ModuleType) -> bool {
        matches!(
            (self, module_type),
            (Self::EcdsaValidator, ModuleType::Validator)
                | (Self::RebalanceExecutor, ModuleType::Executor)
                | (Self::TokenReceiverFallback, ModuleType::Fallback)
                | (Self::SpendingCapHook, ModuleType::Hook)
        )
    }

    /// Build the per-account state from the install payload
    pub fn on_install(&self, module: &Address, init_data: &[u8]) -> Result<ModuleState> {
        let fail = |reason: String| AutoYieldError::ModuleCallbackFailed {
            module: *module,
            reason,
        };
        match self {
            Self::EcdsaValidator => Ok(ModuleState::EcdsaValidator {
                owner: decode_owner(init_data).map_err(fail)?,
            }),
            Self::RebalanceExecutor => Ok(ModuleState::RebalanceExecutor {
                tokens: decode_tokens(init_data).map_err(fail)?.into_iter().collect(),
            }),
            Self::TokenReceiverFallback => {
                if !init_data.is_empty() {
                    return Err(fail("fallback takes no init data".to_string()));
                }
                Ok(ModuleState::TokenReceiverFallback)
            }
            Self::SpendingCapHook => {
                let (token, cap) = decode_spending_cap(init_data).map_err(fail)?;
                if cap == 0 {
                    return Err(fail("cap must be greater than zero".to_string()));
                }
                Ok(ModuleState::SpendingCapHook {
                    token,
                    cap,
                    calls: 0,
                    spent: 0,
                })
            }
        }
    }

    /// Release the per-account state.
    ///
    /// A non-empty de-init payload for the ECDSA validator must name the owner
    /// being removed.
    pub fn on_uninstall(&self, module: &Address, state: &ModuleState, deinit_data: &[u8]) -> Result<()> {
        match (self, state) {
            (Self::EcdsaValidator, ModuleState::EcdsaValidator { owner }) => {
                if !deinit_data.is_empty() && deinit_data != owner.as_bytes() {
                    return Err(AutoYieldError::ModuleCallbackFailed {
                        module: *module,
                        reason: "de-init data does not name the installed owner".to_string(),
                    });
                }
                Ok(())
            }
            (Self::RebalanceExecutor, ModuleState::RebalanceExecutor { .. })
            | (Self::TokenReceiverFallback, ModuleState::TokenReceiverFallback)
            | (Self::SpendingCapHook, ModuleState::SpendingCapHook { .. }) => Ok(()),
            _ => Err(AutoYieldError::InvariantViolated {
                reason: format!("module {} holds state of another kind", module),
            }),
        }
    }
}

/// Per-account state of an installed module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleState {
    EcdsaValidator {
        owner: Address,
    },
    RebalanceExecutor {
        tokens: BTreeSet<Address>,
    },
    TokenReceiverFallback,
    SpendingCapHook {
        token: Address,
        cap: Assets,
        calls: u64,
        spent: Assets,
    },
}

impl ModuleState {
    /// Validator capability: is `signature` over `hash` acceptable?
    pub fn validate_signature(&self, hash: &[u8; 32], signature: &[u8]) -> Result<()> {
        match self {
            Self::EcdsaValidator { owner } => {
                if is_signed_by(hash, signature, owner) {
                    Ok(())
                } else {
                    Err(AutoYieldError::InvalidSignature)
                }
            }
            _ => Err(AutoYieldError::Unauthorized {
                reason: "module is not a validator".to_string(),
            }),
        }
    }

    /// Executor capability: may this executor rebalance `token`?
    pub fn permits_rebalance(&self, token: &Address) -> bool {
        matches!(self, Self::RebalanceExecutor { tokens } if tokens.contains(token))
    }

    /// Fallback capability: does this module answer `selector`?
    pub fn handles(&self, selector: &Selector) -> bool {
        match self {
            Self::TokenReceiverFallback => matches!(
                *selector,
                ON_ERC721_RECEIVED | ON_ERC1155_RECEIVED | ON_ERC1155_BATCH_RECEIVED
            ),
            _ => false,
        }
    }

    /// Hook capability, before the call runs
    pub fn pre_check(&self, call: &Call) -> std::result::Result<(), String> {
        if let Self::SpendingCapHook { token, cap, .. } = self {
            let debit = call
                .required_debit(token)
                .ok_or_else(|| "debit overflows".to_string())?;
            if debit > *cap {
                return Err(format!("call debits {} of {}, cap is {}", debit, token, cap));
            }
        }
        Ok(())
    }

    /// Hook capability, after the call ran
    pub fn post_check(&mut self, call: &Call) {
        if let Self::SpendingCapHook {
            token, calls, spent, ..
        } = self
        {
            *calls += 1;
            *spent = spent.saturating_add(call.required_debit(token).unwrap_or(0));
        }
    }
}
