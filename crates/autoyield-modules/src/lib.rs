//! AutoYield Modules - Pluggable account behavior
//!
//! Modules are a closed set of variants sharing one capability interface
//! ([`ModuleKind::supports`], `on_install`, `on_uninstall`), dispatched by
//! their type tag. A module is deployed once into the [`ModuleCatalog`] and
//! installed per account into that account's [`ModuleRegistry`], which keeps
//! the per-account module state.
//!
//! # Invariants
//!
//! 1. A module is installed under at most one type per account
//! 2. A failed install or uninstall callback leaves the registry unchanged
//! 3. An uninstalled hook is never invoked again

pub mod catalog;
pub mod init;
pub mod kind;
pub mod registry;

pub use catalog::*;
pub use init::*;
pub use kind::*;
pub use registry::*;
