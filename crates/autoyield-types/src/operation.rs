//! Operations submitted to the entry point
//!
//! An operation is an ephemeral, signed, nonce-guarded request to act on an
//! account. Only its nonce consumption outlives execution.

use serde::{Deserialize, Serialize};

use crate::{Address, Assets, AutoYieldError, Call, ModuleType, Result};

/// What the operation asks the account to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountAction {
    /// Raw execution without routing
    Execute(Call),
    /// Top up checking, run the call, sweep surplus into yield
    ExecuteWithAutoYield { token: Address, call: Call },
    /// Clamp checking to the threshold
    Rebalance { token: Address },
    /// Pull every share of `token`'s adapter back into checking
    FlushToChecking { token: Address },
    SetCheckingThreshold { token: Address, threshold: Assets },
    /// Point `token`'s routing at a (recommended) adapter
    SetActiveAdapter { token: Address, adapter: Address },
    /// Flush and drop `token`'s routing config
    ClearRouting { token: Address },
    SetAutomationKey { key: Option<Address> },
    InstallModule {
        module_type: ModuleType,
        module: Address,
        init_data: Vec<u8>,
    },
    UninstallModule {
        module_type: ModuleType,
        module: Address,
        deinit_data: Vec<u8>,
    },
}

impl AccountAction {
    /// Token routed by an action the automation key may trigger on its own
    /// authority.
    ///
    /// Only threshold routing; never arbitrary `to`/`data`.
    pub fn automation_token(&self) -> Option<Address> {
        match self {
            Self::Rebalance { token } => Some(*token),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Execute(_) => "execute",
            Self::ExecuteWithAutoYield { .. } => "execute_with_auto_yield",
            Self::Rebalance { .. } => "rebalance",
            Self::FlushToChecking { .. } => "flush_to_checking",
            Self::SetCheckingThreshold { .. } => "set_checking_threshold",
            Self::SetActiveAdapter { .. } => "set_active_adapter",
            Self::ClearRouting { .. } => "clear_routing",
            Self::SetAutomationKey { .. } => "set_automation_key",
            Self::InstallModule { .. } => "install_module",
            Self::UninstallModule { .. } => "uninstall_module",
        }
    }
}

/// Which authority the operation's signature is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationMode {
    /// The account's root validator
    #[default]
    Root,
    /// A specific installed validator module
    Module(Address),
    /// The account's automation key (routing subset only)
    Automation,
}

/// Gas and fee parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasParams {
    pub verification_gas_limit: u64,
    pub call_gas_limit: u64,
    /// Native units per gas unit
    pub max_fee_per_gas: u128,
}

impl GasParams {
    /// Upper bound the payer must have deposited
    pub fn max_cost(&self) -> Option<Assets> {
        let gas = (self.verification_gas_limit as u128).checked_add(self.call_gas_limit as u128)?;
        gas.checked_mul(self.max_fee_per_gas)
    }
}

impl Default for GasParams {
    fn default() -> Self {
        Self {
            verification_gas_limit: 150_000,
            call_gas_limit: 300_000,
            max_fee_per_gas: 1,
        }
    }
}

/// Time window (unix seconds) during which a signature is usable.
///
/// `valid_until == 0` means no expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub valid_after: u64,
    pub valid_until: u64,
}

impl ValidityWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(valid_after: u64, valid_until: u64) -> Self {
        Self {
            valid_after,
            valid_until,
        }
    }

    pub fn is_not_yet_valid(&self, now: u64) -> bool {
        now < self.valid_after
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.valid_until != 0 && now > self.valid_until
    }

    pub fn contains(&self, now: u64) -> bool {
        !self.is_not_yet_valid(now) && !self.is_expired(now)
    }

    /// Narrowest window satisfying both
    pub fn intersect(&self, other: &ValidityWindow) -> ValidityWindow {
        let valid_until = match (self.valid_until, other.valid_until) {
            (0, b) => b,
            (a, 0) => a,
            (a, b) => a.min(b),
        };
        ValidityWindow {
            valid_after: self.valid_after.max(other.valid_after),
            valid_until,
        }
    }
}

/// Sponsor approval attached to an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorPayload {
    pub sponsor: Address,
    pub window: ValidityWindow,
    /// Sponsor signature over (sponsor, operation hash, window)
    pub signature: Vec<u8>,
}

/// A signed operation envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: u64,
    pub action: AccountAction,
    pub gas: GasParams,
    pub mode: ValidationMode,
    pub window: ValidityWindow,
    pub sponsor: Option<SponsorPayload>,
    pub signature: Vec<u8>,
}

/// The fields covered by the operation hash
#[derive(Serialize)]
struct OperationPreimage<'a> {
    chain_id: u64,
    entry_point: &'a Address,
    sender: &'a Address,
    nonce: u64,
    action: &'a AccountAction,
    gas: &'a GasParams,
    mode: &'a ValidationMode,
    window: &'a ValidityWindow,
    sponsor: Option<&'a Address>,
}

impl UserOperation {
    /// Unsigned operation with default gas, root validation and no window
    pub fn new(sender: Address, nonce: u64, action: AccountAction) -> Self {
        Self {
            sender,
            nonce,
            action,
            gas: GasParams::default(),
            mode: ValidationMode::Root,
            window: ValidityWindow::unbounded(),
            sponsor: None,
            signature: Vec::new(),
        }
    }

    pub fn with_gas(mut self, gas: GasParams) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_window(mut self, window: ValidityWindow) -> Self {
        self.window = window;
        self
    }

    /// Bytes hashed into the operation hash.
    ///
    /// Covers everything except the signatures; the sponsor is committed to
    /// by address only so that the sponsor can sign over the final hash.
    pub fn hash_preimage(&self, chain_id: u64, entry_point: &Address) -> Result<Vec<u8>> {
        let preimage = OperationPreimage {
            chain_id,
            entry_point,
            sender: &self.sender,
            nonce: self.nonce,
            action: &self.action,
            gas: &self.gas,
            mode: &self.mode,
            window: &self.window,
            sponsor: self.sponsor.as_ref().map(|s| &s.sponsor),
        };
        serde_json::to_vec(&preimage).map_err(|e| AutoYieldError::InvariantViolated {
            reason: format!("operation preimage not serializable: {}", e),
        })
    }
}
