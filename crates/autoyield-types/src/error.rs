//! Error types for AutoYield
//!
//! Every failure is typed so automated callers (scheduler, relay) can tell
//! "retry later" apart from "never retry" through [`ErrorClass`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Address, ModuleType};

/// Result type for AutoYield operations
pub type Result<T> = std::result::Result<T, AutoYieldError>;

/// Coarse classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Degenerate caller input
    Input,
    /// Requested fund movement cannot be fully satisfied right now
    Insufficiency,
    /// Signature, window, nonce or sponsor rejection
    Authorization,
    /// Install/uninstall lifecycle violation
    ModuleLifecycle,
    /// The executed call itself failed
    Execution,
    /// Broken internal invariant
    Internal,
}

impl ErrorClass {
    /// Only insufficiency (liquidity, balances) may succeed on a later retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Insufficiency)
    }
}

/// AutoYield error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutoYieldError {
    // ========================================================================
    // Input Errors
    // ========================================================================
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("{role} must not be the zero address")]
    ZeroAddress { role: String },

    #[error("Invalid address: {input}")]
    InvalidAddress { input: String },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Adapter {adapter} holds {actual}, not {expected}")]
    AdapterAssetMismatch {
        adapter: Address,
        expected: Address,
        actual: Address,
    },

    #[error("Adapter {adapter} is not deployed")]
    UnknownAdapter { adapter: Address },

    #[error("Vault {vault} is not deployed")]
    UnknownVault { vault: Address },

    #[error("Account {account} not found")]
    AccountNotFound { account: Address },

    #[error("Account {account} already exists")]
    AccountAlreadyExists { account: Address },

    #[error("No routing configured for token {token}")]
    RoutingNotConfigured { token: Address },

    #[error("Fee per gas {offered} exceeds cap {cap}")]
    GasPriceTooHigh { offered: u128, cap: u128 },

    // ========================================================================
    // Insufficiency Errors
    // ========================================================================
    #[error("Insufficient shares: have {available}, need {required}")]
    InsufficientShares { available: u128, required: u128 },

    #[error("Vault {vault} illiquid: requested {requested}, available {available}")]
    VaultIlliquid {
        vault: Address,
        requested: u128,
        available: u128,
    },

    #[error("Vault {vault} is paused")]
    VaultPaused { vault: Address },

    #[error("Insufficient {token} balance for {holder}: have {available}, need {required}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        available: u128,
        required: u128,
    },

    #[error("Insufficient entry point deposit for {payer}: have {available}, need {required}")]
    InsufficientDeposit {
        payer: Address,
        available: u128,
        required: u128,
    },

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Validator {validator} is not installed")]
    ValidatorNotInstalled { validator: Address },

    #[error("Account {account} has no usable root validator")]
    NoRootValidator { account: Address },

    #[error("Operation not valid before {valid_after} (now {now})")]
    NotYetValid { valid_after: u64, now: u64 },

    #[error("Operation expired at {valid_until} (now {now})")]
    Expired { valid_until: u64, now: u64 },

    #[error("Invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("Sponsor {sponsor} is not registered")]
    SponsorNotRegistered { sponsor: Address },

    #[error("Sponsor rejected operation: {reason}")]
    SponsorRejected { reason: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Automation key may not perform {action}")]
    AutomationScopeViolation { action: String },

    // ========================================================================
    // Module Lifecycle Errors
    // ========================================================================
    #[error("Module {module} is not deployed")]
    ModuleNotDeployed { module: Address },

    #[error("Module {module} does not support type {module_type}")]
    ModuleTypeNotSupported {
        module: Address,
        module_type: ModuleType,
    },

    #[error("Module {module} already installed as {module_type}")]
    ModuleAlreadyInstalled {
        module: Address,
        module_type: ModuleType,
    },

    #[error("Module {module} not installed as {module_type}")]
    ModuleNotInstalled {
        module: Address,
        module_type: ModuleType,
    },

    #[error("Module {module} callback failed: {reason}")]
    ModuleCallbackFailed { module: Address, reason: String },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    #[error("Call to {to} failed: {reason}")]
    CallFailed { to: Address, reason: String },

    #[error("Hook {hook} rejected execution: {reason}")]
    HookRejected { hook: Address, reason: String },

    // ========================================================================
    // Internal Errors
    // ========================================================================
    #[error("Invariant violated: {reason}")]
    InvariantViolated { reason: String },

    #[error("Cryptographic error: {message}")]
    Crypto { message: String },
}

impl AutoYieldError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ZeroAmount
            | Self::ZeroAddress { .. }
            | Self::InvalidAddress { .. }
            | Self::ArithmeticOverflow
            | Self::AdapterAssetMismatch { .. }
            | Self::UnknownAdapter { .. }
            | Self::UnknownVault { .. }
            | Self::AccountNotFound { .. }
            | Self::AccountAlreadyExists { .. }
            | Self::RoutingNotConfigured { .. }
            | Self::GasPriceTooHigh { .. } => ErrorClass::Input,

            Self::InsufficientShares { .. }
            | Self::VaultIlliquid { .. }
            | Self::VaultPaused { .. }
            | Self::InsufficientBalance { .. }
            | Self::InsufficientDeposit { .. } => ErrorClass::Insufficiency,

            Self::InvalidSignature
            | Self::ValidatorNotInstalled { .. }
            | Self::NoRootValidator { .. }
            | Self::NotYetValid { .. }
            | Self::Expired { .. }
            | Self::InvalidNonce { .. }
            | Self::SponsorNotRegistered { .. }
            | Self::SponsorRejected { .. }
            | Self::Unauthorized { .. }
            | Self::AutomationScopeViolation { .. } => ErrorClass::Authorization,

            Self::ModuleNotDeployed { .. }
            | Self::ModuleTypeNotSupported { .. }
            | Self::ModuleAlreadyInstalled { .. }
            | Self::ModuleNotInstalled { .. }
            | Self::ModuleCallbackFailed { .. } => ErrorClass::ModuleLifecycle,

            Self::CallFailed { .. } | Self::HookRejected { .. } => ErrorClass::Execution,

            Self::InvariantViolated { .. } | Self::Crypto { .. } => ErrorClass::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }

    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "zero_amount",
            Self::ZeroAddress { .. } => "zero_address",
            Self::InvalidAddress { .. } => "invalid_address",
            Self::ArithmeticOverflow => "arithmetic_overflow",
            Self::AdapterAssetMismatch { .. } => "adapter_asset_mismatch",
            Self::UnknownAdapter { .. } => "unknown_adapter",
            Self::UnknownVault { .. } => "unknown_vault",
            Self::AccountNotFound { .. } => "account_not_found",
            Self::AccountAlreadyExists { .. } => "account_already_exists",
            Self::RoutingNotConfigured { .. } => "routing_not_configured",
            Self::GasPriceTooHigh { .. } => "gas_price_too_high",
            Self::InsufficientShares { .. } => "insufficient_shares",
            Self::VaultIlliquid { .. } => "vault_illiquid",
            Self::VaultPaused { .. } => "vault_paused",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::InsufficientDeposit { .. } => "insufficient_deposit",
            Self::InvalidSignature => "invalid_signature",
            Self::ValidatorNotInstalled { .. } => "validator_not_installed",
            Self::NoRootValidator { .. } => "no_root_validator",
            Self::NotYetValid { .. } => "not_yet_valid",
            Self::Expired { .. } => "expired",
            Self::InvalidNonce { .. } => "invalid_nonce",
            Self::SponsorNotRegistered { .. } => "sponsor_not_registered",
            Self::SponsorRejected { .. } => "sponsor_rejected",
            Self::Unauthorized { .. } => "unauthorized",
            Self::AutomationScopeViolation { .. } => "automation_scope_violation",
            Self::ModuleNotDeployed { .. } => "module_not_deployed",
            Self::ModuleTypeNotSupported { .. } => "module_type_not_supported",
            Self::ModuleAlreadyInstalled { .. } => "module_already_installed",
            Self::ModuleNotInstalled { .. } => "module_not_installed",
            Self::ModuleCallbackFailed { .. } => "module_callback_failed",
            Self::CallFailed { .. } => "call_failed",
            Self::HookRejected { .. } => "hook_rejected",
            Self::InvariantViolated { .. } => "invariant_violated",
            Self::Crypto { .. } => "crypto",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_insufficiency_is_retryable() {
        assert!(AutoYieldError::InsufficientShares { available: 1, required: 2 }.is_retryable());
        assert!(AutoYieldError::VaultIlliquid {
            vault: Address::ZERO,
            requested: 2,
            available: 1
        }
        .is_retryable());
        assert!(!AutoYieldError::InvalidSignature.is_retryable());
        assert!(!AutoYieldError::ZeroAmount.is_retryable());
        assert!(!AutoYieldError::ModuleAlreadyInstalled {
            module: Address::ZERO,
            module_type: ModuleType::Hook
        }
        .is_retryable());
    }

    #[test]
    fn test_classes() {
        assert_eq!(AutoYieldError::ZeroAmount.class(), ErrorClass::Input);
        assert_eq!(
            AutoYieldError::InvalidNonce { expected: 1, got: 0 }.class(),
            ErrorClass::Authorization
        );
        assert_eq!(
            AutoYieldError::CallFailed { to: Address::ZERO, reason: "boom".into() }.class(),
            ErrorClass::Execution
        );
    }
}
