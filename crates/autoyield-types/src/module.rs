//! Module type tags

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four module types an account can install.
///
/// Numeric ids follow the modular-account convention (1 = validator,
/// 2 = executor, 3 = fallback, 4 = hook).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleType {
    /// Authorizes operations
    Validator,
    /// May trigger account execution on its own authority
    Executor,
    /// Answers calls the account does not handle itself
    Fallback,
    /// Runs before and after every execution
    Hook,
}

impl ModuleType {
    pub const ALL: [ModuleType; 4] = [
        ModuleType::Validator,
        ModuleType::Executor,
        ModuleType::Fallback,
        ModuleType::Hook,
    ];

    pub fn type_id(&self) -> u8 {
        match self {
            Self::Validator => 1,
            Self::Executor => 2,
            Self::Fallback => 3,
            Self::Hook => 4,
        }
    }

    pub fn from_type_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Validator),
            2 => Some(Self::Executor),
            3 => Some(Self::Fallback),
            4 => Some(Self::Hook),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validator => "validator",
            Self::Executor => "executor",
            Self::Fallback => "fallback",
            Self::Hook => "hook",
        };
        write!(f, "{}", name)
    }
}
