//! Counterfactual account creation

use autoyield_crypto::derive_address;
use autoyield_modules::{encode_owner, ModuleKind};
use autoyield_types::{Address, AutoYieldError, ModuleType, Result};
use serde::{Deserialize, Serialize};

use crate::{ChainState, SmartAccount};

/// Creates accounts at addresses derived from (factory, owner, salt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFactory {
    address: Address,
}

impl Default for AccountFactory {
    fn default() -> Self {
        Self::new(Address::from_label("autoyield.factory"))
    }
}

impl AccountFactory {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Address the account for `owner` and `salt` lives at, created or not
    pub fn account_address(&self, owner: &Address, salt: u64) -> Address {
        derive_address(
            "autoyield.account",
            &[self.address.as_bytes(), owner.as_bytes(), &salt.to_be_bytes()],
        )
    }

    /// Create the account with the ECDSA validator installed as root,
    /// owned by `owner`
    pub fn create_account(&self, state: &mut ChainState, owner: &Address, salt: u64) -> Result<Address> {
        if owner.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "owner".to_string(),
            });
        }
        let address = self.account_address(owner, salt);
        if state.is_account(&address) {
            return Err(AutoYieldError::AccountAlreadyExists { account: address });
        }

        let validator = ModuleKind::EcdsaValidator.canonical_address();
        let kind = state.catalog.get(&validator)?;
        let mut account = SmartAccount::new(address, validator);
        account.modules.install(
            &address,
            ModuleType::Validator,
            &validator,
            kind,
            &encode_owner(owner),
            &mut state.events,
        )?;
        state.accounts.insert(address, account);

        tracing::info!(account = %address, owner = %owner, salt, "account created");
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_is_deterministic() {
        let factory = AccountFactory::default();
        let owner = Address::from_label("owner");
        assert_eq!(factory.account_address(&owner, 0), factory.account_address(&owner, 0));
        assert_ne!(factory.account_address(&owner, 0), factory.account_address(&owner, 1));
    }

    #[test]
    fn test_create_installs_root_validator() {
        let mut state = ChainState::new();
        let factory = AccountFactory::default();
        let owner = Address::from_label("owner");

        let account = factory.create_account(&mut state, &owner, 7).unwrap();
        assert_eq!(account, factory.account_address(&owner, 7));
        assert!(state.account(&account).unwrap().has_usable_root_validator());

        assert!(matches!(
            factory.create_account(&mut state, &owner, 7),
            Err(AutoYieldError::AccountAlreadyExists { .. })
        ));
        assert!(matches!(
            factory.create_account(&mut state, &Address::ZERO, 8),
            Err(AutoYieldError::ZeroAddress { .. })
        ));
    }
}
