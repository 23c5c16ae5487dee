//! AutoYield Account - The modular smart account and its entry point
//!
//! - [`ChainState`]: every balance, vault, adapter, account and deposit; a
//!   unit of work runs on a staged clone and is swapped in only on success
//! - [`SmartAccount`] / [`AccountFactory`]: module registry plus routing
//!   engine per account, created with a root ECDSA validator
//! - [`OperationValidator`]: side-effect free authorization and sponsorship
//!   checks
//! - [`EntryPoint`]: nonce-guarded, fee-charging execution of signed
//!   operations behind a single async write lock
//! - [`recommendation`]: intake of "use this adapter" recommendations
//!
//! # Invariants
//!
//! 1. A submitted operation either fully succeeds or fully reverts
//! 2. A consumed nonce is never accepted again
//! 3. Validation never mutates state

pub mod account;
pub mod entry_point;
pub mod execution;
pub mod factory;
pub mod recommendation;
pub mod signing;
pub mod state;
pub mod target;
pub mod validator;

pub use account::*;
pub use entry_point::*;
pub use execution::*;
pub use factory::*;
pub use recommendation::*;
pub use signing::*;
pub use state::*;
pub use target::*;
pub use validator::*;
