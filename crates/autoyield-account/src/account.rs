//! The smart account record

use autoyield_modules::ModuleRegistry;
use autoyield_router::RoutingEngine;
use autoyield_types::{Address, ModuleType};
use serde::{Deserialize, Serialize};

/// An account: installed modules plus per-token routing.
///
/// Accounts are never destroyed. Uninstalling the root validator leaves the
/// account without a usable root authority, which is terminal unless another
/// validator was installed beforehand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartAccount {
    address: Address,
    root_validator: Address,
    pub(crate) modules: ModuleRegistry,
    pub(crate) routing: RoutingEngine,
}

impl SmartAccount {
    pub(crate) fn new(address: Address, root_validator: Address) -> Self {
        Self {
            address,
            root_validator,
            modules: ModuleRegistry::new(),
            routing: RoutingEngine::new(address),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn root_validator(&self) -> Address {
        self.root_validator
    }

    pub fn has_usable_root_validator(&self) -> bool {
        self.modules
            .is_module_installed(ModuleType::Validator, &self.root_validator, &[])
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn routing(&self) -> &RoutingEngine {
        &self.routing
    }
}
