//! AutoYield Types - Canonical domain types for the auto-yield smart account
//!
//! This crate contains all foundational types with zero dependencies on other
//! autoyield crates:
//!
//! - `Address` identities (accounts, tokens, vaults, adapters, modules)
//! - Module type tags
//! - Calls and operations submitted to the entry point
//! - Events emitted by committed execution units
//! - The error taxonomy shared by every layer
//!
//! # Invariants
//!
//! 1. Every amount is an integer count of smallest units (`u128`)
//! 2. Shares and assets are never mixed without a vault conversion
//! 3. A failed unit of work leaves no observable effect

pub mod address;
pub mod call;
pub mod error;
pub mod event;
pub mod module;
pub mod operation;

pub use address::*;
pub use call::*;
pub use error::*;
pub use event::*;
pub use module::*;
pub use operation::*;

/// Underlying-asset amount in smallest token units.
pub type Assets = u128;

/// Vault share amount.
pub type Shares = u128;

/// Version of the AutoYield types schema
pub const TYPES_VERSION: &str = "0.1.0";
