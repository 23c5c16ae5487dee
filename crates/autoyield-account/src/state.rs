//! Chain state and unit-of-work staging

use std::collections::{BTreeMap, BTreeSet};

use autoyield_ledger::TokenLedger;
use autoyield_modules::{ModuleCatalog, ModuleKind};
use autoyield_types::{Address, Assets, AutoYieldError, Event, Result};
use autoyield_vault::{Adapter, InMemoryVault, VaultOracle};

use crate::{CallTarget, SmartAccount};

/// Everything an operation can observe or change.
///
/// Plain data: a unit of work runs on a clone (see [`ChainState::stage`]) and
/// replaces the original only when it succeeds, so a failed unit leaves every
/// balance, share and event bit-identical.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub(crate) ledger: TokenLedger,
    pub(crate) tokens: BTreeSet<Address>,
    pub(crate) vaults: BTreeMap<Address, InMemoryVault>,
    pub(crate) adapters: BTreeMap<Address, Adapter>,
    pub(crate) catalog: ModuleCatalog,
    pub(crate) accounts: BTreeMap<Address, SmartAccount>,
    pub(crate) targets: BTreeMap<Address, Box<dyn CallTarget>>,
    /// Entry point prefund balances (native units)
    pub(crate) deposits: BTreeMap<Address, Assets>,
    pub(crate) nonces: BTreeMap<Address, u64>,
    pub(crate) sponsors: BTreeSet<Address>,
    pub(crate) events: Vec<Event>,
    pub(crate) timestamp: u64,
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainState {
    /// Empty state with the native coin registered and every module kind
    /// deployed at its canonical address
    pub fn new() -> Self {
        let mut tokens = BTreeSet::new();
        tokens.insert(Address::NATIVE);
        Self {
            ledger: TokenLedger::new(),
            tokens,
            vaults: BTreeMap::new(),
            adapters: BTreeMap::new(),
            catalog: ModuleCatalog::with_defaults(),
            accounts: BTreeMap::new(),
            targets: BTreeMap::new(),
            deposits: BTreeMap::new(),
            nonces: BTreeMap::new(),
            sponsors: BTreeSet::new(),
            events: Vec::new(),
            timestamp: 0,
        }
    }

    /// Run `f` on a staged copy; commit on `Ok`, discard on `Err`.
    ///
    /// The append-only logs (events, ledger entries) are moved into the
    /// staged copy instead of cloned, and cut back to their previous length
    /// on `Err`.
    pub fn stage<R>(&mut self, f: impl FnOnce(&mut ChainState) -> Result<R>) -> Result<R> {
        let events = std::mem::take(&mut self.events);
        let entries = self.ledger.take_history();
        let (events_len, entries_len) = (events.len(), entries.len());

        let mut staged = self.clone();
        staged.events = events;
        staged.ledger.restore_history(entries, entries_len);

        match f(&mut staged) {
            Ok(value) => {
                *self = staged;
                Ok(value)
            }
            Err(e) => {
                let mut events = std::mem::take(&mut staged.events);
                events.truncate(events_len);
                self.events = events;
                self.ledger
                    .restore_history(staged.ledger.take_history(), entries_len);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn balance_of(&self, token: &Address, holder: &Address) -> Assets {
        self.ledger.balance_of(token, holder)
    }

    pub fn account(&self, address: &Address) -> Result<&SmartAccount> {
        self.accounts
            .get(address)
            .ok_or(AutoYieldError::AccountNotFound { account: *address })
    }

    pub(crate) fn account_mut(&mut self, address: &Address) -> Result<&mut SmartAccount> {
        self.accounts
            .get_mut(address)
            .ok_or(AutoYieldError::AccountNotFound { account: *address })
    }

    pub fn is_account(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn adapter(&self, address: &Address) -> Result<&Adapter> {
        self.adapters
            .get(address)
            .ok_or(AutoYieldError::UnknownAdapter { adapter: *address })
    }

    pub fn vault(&self, address: &Address) -> Result<&InMemoryVault> {
        self.vaults
            .get(address)
            .ok_or(AutoYieldError::UnknownVault { vault: *address })
    }

    pub(crate) fn vault_mut(&mut self, address: &Address) -> Result<&mut InMemoryVault> {
        self.vaults
            .get_mut(address)
            .ok_or(AutoYieldError::UnknownVault { vault: *address })
    }

    pub fn target(&self, address: &Address) -> Option<&dyn CallTarget> {
        self.targets.get(address).map(|t| t.as_ref())
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn nonce_of(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    pub fn deposit_of(&self, holder: &Address) -> Assets {
        self.deposits.get(holder).copied().unwrap_or(0)
    }

    pub fn is_sponsor(&self, sponsor: &Address) -> bool {
        self.sponsors.contains(sponsor)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Value of `depositor`'s position in `adapter`
    pub fn position_value(&self, adapter: &Address, depositor: &Address) -> Result<Assets> {
        let adapter = self.adapter(adapter)?;
        let vault = self.vault(&adapter.vault())?;
        adapter.total_value(vault, &self.ledger, depositor)
    }

    // ========================================================================
    // Deployment
    // ========================================================================

    pub fn register_token(&mut self, token: Address) -> Result<()> {
        if token.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "token".to_string(),
            });
        }
        self.tokens.insert(token);
        Ok(())
    }

    pub fn is_token(&self, token: &Address) -> bool {
        self.tokens.contains(token)
    }

    /// Mint `amount` of a registered token to `to`
    pub fn mint(&mut self, token: &Address, to: &Address, amount: Assets) -> Result<Assets> {
        if !self.is_token(token) {
            return Err(AutoYieldError::CallFailed {
                to: *token,
                reason: "not a registered token".to_string(),
            });
        }
        self.ledger.mint(token, to, amount)
    }

    pub fn deploy_vault(&mut self, vault: InMemoryVault) -> Result<Address> {
        let address = vault.address();
        if !self.is_token(&vault.asset()) {
            return Err(AutoYieldError::CallFailed {
                to: vault.asset(),
                reason: "vault asset is not a registered token".to_string(),
            });
        }
        if self.vaults.contains_key(&address) {
            return Err(AutoYieldError::InvariantViolated {
                reason: format!("vault {} already deployed", address),
            });
        }
        tracing::info!(vault = %address, asset = %vault.asset(), "vault deployed");
        self.vaults.insert(address, vault);
        Ok(address)
    }

    /// Deploy an adapter bound to the vault at `vault` for life
    pub fn deploy_adapter(&mut self, address: Address, vault: &Address) -> Result<Address> {
        if vault.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "vault".to_string(),
            });
        }
        let asset = self.vault(vault)?.asset();
        if self.adapters.contains_key(&address) {
            return Err(AutoYieldError::InvariantViolated {
                reason: format!("adapter {} already deployed", address),
            });
        }
        let adapter = Adapter::new(address, *vault, asset)?;
        tracing::info!(adapter = %address, vault = %vault, asset = %asset, "adapter deployed");
        self.adapters.insert(address, adapter);
        Ok(address)
    }

    pub fn deploy_target(&mut self, target: Box<dyn CallTarget>) -> Result<Address> {
        let address = target.address();
        if address.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "call target".to_string(),
            });
        }
        self.targets.insert(address, target);
        Ok(address)
    }

    pub fn deploy_module(&mut self, address: Address, kind: ModuleKind) -> Result<()> {
        self.catalog.deploy(address, kind)
    }

    // ========================================================================
    // Vault liquidity controls
    // ========================================================================

    pub fn vault_deploy(&mut self, vault: &Address, amount: Assets) -> Result<()> {
        let vault = self
            .vaults
            .get_mut(vault)
            .ok_or(AutoYieldError::UnknownVault { vault: *vault })?;
        vault.deploy(&mut self.ledger, amount)
    }

    pub fn vault_recall(&mut self, vault: &Address, amount: Assets) -> Result<()> {
        let vault = self
            .vaults
            .get_mut(vault)
            .ok_or(AutoYieldError::UnknownVault { vault: *vault })?;
        vault.recall(&mut self.ledger, amount)
    }

    pub fn vault_accrue(&mut self, vault: &Address, amount: Assets) -> Result<()> {
        let vault = self
            .vaults
            .get_mut(vault)
            .ok_or(AutoYieldError::UnknownVault { vault: *vault })?;
        vault.accrue(&mut self.ledger, amount)
    }

    pub fn vault_set_paused(&mut self, vault: &Address, paused: bool) -> Result<()> {
        self.vault_mut(vault)?.set_paused(paused);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_discards_on_error() {
        let mut state = ChainState::new();
        let usdc = Address::from_label("usdc");
        let alice = Address::from_label("alice");
        state.register_token(usdc).unwrap();

        let result: Result<()> = state.stage(|s| {
            s.mint(&usdc, &alice, 100)?;
            Err(AutoYieldError::ZeroAmount)
        });
        assert!(result.is_err());
        assert_eq!(state.balance_of(&usdc, &alice), 0);

        state.stage(|s| s.mint(&usdc, &alice, 100)).unwrap();
        assert_eq!(state.balance_of(&usdc, &alice), 100);
    }

    #[test]
    fn test_stage_trims_logs_on_error() {
        let mut state = ChainState::new();
        let usdc = Address::from_label("usdc");
        let alice = Address::from_label("alice");
        state.register_token(usdc).unwrap();
        state.stage(|s| s.mint(&usdc, &alice, 100)).unwrap();
        state.events.push(Event::Executed {
            account: alice,
            to: usdc,
            value: 0,
        });
        let history = state.ledger().entry_count();

        // Nested unit fails inside a committed one
        state
            .stage(|outer| {
                outer.mint(&usdc, &alice, 5)?;
                let inner: Result<()> = outer.stage(|s| {
                    s.mint(&usdc, &alice, 7)?;
                    s.events.push(Event::Executed {
                        account: alice,
                        to: usdc,
                        value: 7,
                    });
                    Err(AutoYieldError::ZeroAmount)
                });
                assert!(inner.is_err());
                Ok(())
            })
            .unwrap();
        assert_eq!(state.balance_of(&usdc, &alice), 105);
        assert_eq!(state.ledger().entry_count(), history + 1);
        assert_eq!(state.events().len(), 1);

        let failed: Result<()> = state.stage(|s| {
            s.mint(&usdc, &alice, 1)?;
            s.events.push(Event::Executed {
                account: alice,
                to: usdc,
                value: 1,
            });
            Err(AutoYieldError::ZeroAmount)
        });
        assert!(failed.is_err());
        assert_eq!(state.ledger().entry_count(), history + 1);
        assert_eq!(state.events().len(), 1);
        let last = state.ledger().recent_entries(1);
        assert_eq!(last[0].sequence, history as u64);
    }

    #[test]
    fn test_adapter_requires_deployed_vault() {
        let mut state = ChainState::new();
        let usdc = Address::from_label("usdc");
        state.register_token(usdc).unwrap();
        let adapter = Address::from_label("adapter");

        assert!(matches!(
            state.deploy_adapter(adapter, &Address::ZERO),
            Err(AutoYieldError::ZeroAddress { .. })
        ));
        assert!(matches!(
            state.deploy_adapter(adapter, &Address::from_label("vault")),
            Err(AutoYieldError::UnknownVault { .. })
        ));

        let vault = InMemoryVault::new(Address::from_label("vault"), usdc).unwrap();
        let vault = state.deploy_vault(vault).unwrap();
        state.deploy_adapter(adapter, &vault).unwrap();
        assert_eq!(state.adapter(&adapter).unwrap().asset(), usdc);
    }
}
