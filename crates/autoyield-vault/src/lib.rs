//! AutoYield Vault - External yield vaults and the adapters wrapping them
//!
//! - [`VaultOracle`]: the opaque deposit/withdraw/convert interface of an
//!   external vault. Its answers are ground truth and never cached.
//! - [`InMemoryVault`]: a tokenized vault with virtual-offset share math and
//!   an idle/deployed liquidity model.
//! - [`Adapter`]: binds one vault for life and keeps the per-depositor share
//!   ledger.
//!
//! # Invariants
//!
//! 1. `sum(adapter shares) == adapter.total_shares_held()` at all times
//! 2. Shares are created only by a vault deposit and destroyed only by a
//!    vault withdrawal or redemption
//! 3. Withdrawal share math rounds against the withdrawer

pub mod adapter;
pub mod math;
pub mod memory;
pub mod oracle;

pub use adapter::*;
pub use math::*;
pub use memory::*;
pub use oracle::*;
