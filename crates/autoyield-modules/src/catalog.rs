//! Deployed module implementations, keyed by address

use std::collections::BTreeMap;

use autoyield_types::{Address, AutoYieldError, Result};
use serde::{Deserialize, Serialize};

use crate::ModuleKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleCatalog {
    modules: BTreeMap<Address, ModuleKind>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every module kind deployed at its canonical address
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        for kind in ModuleKind::ALL {
            catalog.modules.insert(kind.canonical_address(), kind);
        }
        catalog
    }

    /// Deploy `kind` at `address`. Redeploying an address is rejected.
    pub fn deploy(&mut self, address: Address, kind: ModuleKind) -> Result<()> {
        if address.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "module".to_string(),
            });
        }
        if self.modules.contains_key(&address) {
            return Err(AutoYieldError::InvariantViolated {
                reason: format!("module address {} already deployed", address),
            });
        }
        self.modules.insert(address, kind);
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Result<ModuleKind> {
        self.modules
            .get(address)
            .copied()
            .ok_or(AutoYieldError::ModuleNotDeployed { module: *address })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deployed() {
        let catalog = ModuleCatalog::with_defaults();
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.get(&ModuleKind::SpendingCapHook.canonical_address()).unwrap(),
            ModuleKind::SpendingCapHook
        );
        assert!(matches!(
            catalog.get(&Address::from_label("nothing")),
            Err(AutoYieldError::ModuleNotDeployed { .. })
        ));
    }

    #[test]
    fn test_redeploy_rejected() {
        let mut catalog = ModuleCatalog::new();
        let addr = Address::from_label("custom-validator");
        catalog.deploy(addr, ModuleKind::EcdsaValidator).unwrap();
        assert!(catalog.deploy(addr, ModuleKind::SpendingCapHook).is_err());
        assert!(catalog.deploy(Address::ZERO, ModuleKind::SpendingCapHook).is_err());
    }
}
