//! AutoYield Router - Moves funds between checking and yield
//!
//! The [`RoutingEngine`] holds one account's per-token [`RoutingConfig`]s and
//! the account's automation key. Fund movement goes through a
//! [`RoutingContext`], implemented by the account layer over a staged copy of
//! chain state, so a failing phase never leaves a partial effect behind.
//! Status queries only need the read-only [`RoutingView`].
//!
//! # Invariants
//!
//! 1. With sufficient adapter liquidity, `rebalance` leaves checking equal to
//!    the threshold
//! 2. `rebalance` is idempotent
//! 3. An active adapter's underlying asset equals the configured token

pub mod config;
pub mod context;
pub mod engine;

pub use config::*;
pub use context::*;
pub use engine::*;
