//! In-memory tokenized vault
//!
//! Share math uses a virtual offset of one share and one asset so the first
//! depositor cannot be front-run by a donation. Liquidity is split between
//! idle assets (the vault's own token balance) and assets deployed to a
//! strategy holder; only idle assets can leave through withdraw/redeem.

use std::collections::BTreeMap;

use autoyield_ledger::TokenLedger;
use autoyield_types::{Address, Assets, AutoYieldError, Result, Shares};
use serde::{Deserialize, Serialize};

use crate::{mul_div, Rounding, VaultOracle};

const VIRTUAL_SHARES: u128 = 1;
const VIRTUAL_ASSETS: u128 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryVault {
    address: Address,
    asset: Address,
    /// Holder of deployed assets
    strategy: Address,
    total_supply: Shares,
    balances: BTreeMap<Address, Shares>,
    paused: bool,
}

impl InMemoryVault {
    pub fn new(address: Address, asset: Address) -> Result<Self> {
        if address.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "vault".to_string(),
            });
        }
        if asset.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "vault asset".to_string(),
            });
        }
        let strategy = Address::from_label(&format!("{}/strategy", address));
        Ok(Self {
            address,
            asset,
            strategy,
            total_supply: 0,
            balances: BTreeMap::new(),
            paused: false,
        })
    }

    pub fn strategy(&self) -> Address {
        self.strategy
    }

    pub fn set_paused(&mut self, paused: bool) {
        tracing::info!(vault = %self.address, paused, "vault pause toggled");
        self.paused = paused;
    }

    /// Move idle assets into the strategy (reduces withdrawable liquidity)
    pub fn deploy(&mut self, ledger: &mut TokenLedger, amount: Assets) -> Result<()> {
        ledger.transfer(&self.asset, &self.address, &self.strategy, amount)
    }

    /// Bring deployed assets back to idle
    pub fn recall(&mut self, ledger: &mut TokenLedger, amount: Assets) -> Result<()> {
        ledger.transfer(&self.asset, &self.strategy, &self.address, amount)
    }

    /// Strategy gains: raises total assets without minting shares
    pub fn accrue(&mut self, ledger: &mut TokenLedger, amount: Assets) -> Result<()> {
        ledger.mint(&self.asset, &self.strategy, amount)?;
        tracing::debug!(vault = %self.address, amount, "yield accrued");
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.paused {
            return Err(AutoYieldError::VaultPaused {
                vault: self.address,
            });
        }
        Ok(())
    }

    fn ensure_idle(&self, ledger: &TokenLedger, requested: Assets) -> Result<()> {
        let available = self.idle_assets(ledger);
        if requested > available {
            return Err(AutoYieldError::VaultIlliquid {
                vault: self.address,
                requested,
                available,
            });
        }
        Ok(())
    }

    fn burn_shares(&mut self, owner: &Address, shares: Shares) -> Result<()> {
        let available = self.balance_of(owner);
        if available < shares {
            return Err(AutoYieldError::InsufficientShares {
                available,
                required: shares,
            });
        }
        self.balances.insert(*owner, available - shares);
        self.total_supply -= shares;
        Ok(())
    }

    fn to_shares(&self, ledger: &TokenLedger, assets: Assets, rounding: Rounding) -> Result<Shares> {
        let supply = self
            .total_supply
            .checked_add(VIRTUAL_SHARES)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        let total = self
            .total_assets(ledger)
            .checked_add(VIRTUAL_ASSETS)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        mul_div(assets, supply, total, rounding)
    }

    fn to_assets(&self, ledger: &TokenLedger, shares: Shares, rounding: Rounding) -> Result<Assets> {
        let supply = self
            .total_supply
            .checked_add(VIRTUAL_SHARES)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        let total = self
            .total_assets(ledger)
            .checked_add(VIRTUAL_ASSETS)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        mul_div(shares, total, supply, rounding)
    }
}

impl VaultOracle for InMemoryVault {
    fn address(&self) -> Address {
        self.address
    }

    fn asset(&self) -> Address {
        self.asset
    }

    fn total_assets(&self, ledger: &TokenLedger) -> Assets {
        ledger
            .balance_of(&self.asset, &self.address)
            .saturating_add(ledger.balance_of(&self.asset, &self.strategy))
    }

    fn total_supply(&self) -> Shares {
        self.total_supply
    }

    fn balance_of(&self, owner: &Address) -> Shares {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn idle_assets(&self, ledger: &TokenLedger) -> Assets {
        ledger.balance_of(&self.asset, &self.address)
    }

    fn convert_to_shares(&self, ledger: &TokenLedger, assets: Assets) -> Result<Shares> {
        self.to_shares(ledger, assets, Rounding::Down)
    }

    fn convert_to_assets(&self, ledger: &TokenLedger, shares: Shares) -> Result<Assets> {
        self.to_assets(ledger, shares, Rounding::Down)
    }

    fn preview_deposit(&self, ledger: &TokenLedger, assets: Assets) -> Result<Shares> {
        self.to_shares(ledger, assets, Rounding::Down)
    }

    fn preview_withdraw(&self, ledger: &TokenLedger, assets: Assets) -> Result<Shares> {
        self.to_shares(ledger, assets, Rounding::Up)
    }

    fn preview_redeem(&self, ledger: &TokenLedger, shares: Shares) -> Result<Assets> {
        self.to_assets(ledger, shares, Rounding::Down)
    }

    fn max_withdraw(&self, ledger: &TokenLedger, owner: &Address) -> Result<Assets> {
        if self.paused {
            return Ok(0);
        }
        let value = self.convert_to_assets(ledger, self.balance_of(owner))?;
        Ok(value.min(self.idle_assets(ledger)))
    }

    fn deposit(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &Address,
        assets: Assets,
        receiver: &Address,
    ) -> Result<Shares> {
        self.ensure_active()?;
        if assets == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        let shares = self.preview_deposit(ledger, assets)?;
        if shares == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        let total_supply = self
            .total_supply
            .checked_add(shares)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;

        ledger.transfer(&self.asset, caller, &self.address, assets)?;
        self.total_supply = total_supply;
        *self.balances.entry(*receiver).or_insert(0) += shares;
        Ok(shares)
    }

    fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        assets: Assets,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Shares> {
        self.ensure_active()?;
        if assets == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        let shares = self.preview_withdraw(ledger, assets)?;
        self.ensure_idle(ledger, assets)?;
        self.burn_shares(owner, shares)?;
        ledger.transfer(&self.asset, &self.address, receiver, assets)?;
        Ok(shares)
    }

    fn redeem(
        &mut self,
        ledger: &mut TokenLedger,
        shares: Shares,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Assets> {
        self.ensure_active()?;
        if shares == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        let assets = self.preview_redeem(ledger, shares)?;
        self.ensure_idle(ledger, assets)?;
        self.burn_shares(owner, shares)?;
        if assets > 0 {
            ledger.transfer(&self.asset, &self.address, receiver, assets)?;
        }
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TokenLedger, InMemoryVault, Address, Address) {
        let usdc = Address::from_label("usdc");
        let alice = Address::from_label("alice");
        let mut ledger = TokenLedger::new();
        ledger.mint(&usdc, &alice, 10_000).unwrap();
        let vault = InMemoryVault::new(Address::from_label("vault"), usdc).unwrap();
        (ledger, vault, usdc, alice)
    }

    #[test]
    fn test_first_deposit_is_one_to_one() {
        let (mut ledger, mut vault, usdc, alice) = setup();
        let shares = vault.deposit(&mut ledger, &alice, 1_000, &alice).unwrap();
        assert_eq!(shares, 1_000);
        assert_eq!(vault.total_assets(&ledger), 1_000);
        assert_eq!(ledger.balance_of(&usdc, &alice), 9_000);
    }

    #[test]
    fn test_accrual_raises_share_value() {
        let (mut ledger, mut vault, _, alice) = setup();
        vault.deposit(&mut ledger, &alice, 1_000, &alice).unwrap();
        vault.accrue(&mut ledger, 100).unwrap();

        // 1000 * 1101 / 1001 = 1099.9 -> 1099
        assert_eq!(vault.convert_to_assets(&ledger, 1_000).unwrap(), 1_099);
        // Withdrawal rounds shares up, redemption rounds assets down
        let burn = vault.preview_withdraw(&ledger, 500).unwrap();
        assert!(vault.preview_redeem(&ledger, burn).unwrap() >= 500);
    }

    #[test]
    fn test_withdraw_beyond_idle_is_illiquid() {
        let (mut ledger, mut vault, _, alice) = setup();
        vault.deposit(&mut ledger, &alice, 1_000, &alice).unwrap();
        vault.deploy(&mut ledger, 800).unwrap();

        assert_eq!(vault.max_withdraw(&ledger, &alice).unwrap(), 200);
        let result = vault.withdraw(&mut ledger, 300, &alice, &alice);
        assert!(matches!(
            result,
            Err(AutoYieldError::VaultIlliquid { requested: 300, available: 200, .. })
        ));
        assert_eq!(vault.balance_of(&alice), 1_000);

        vault.recall(&mut ledger, 800).unwrap();
        assert_eq!(vault.withdraw(&mut ledger, 300, &alice, &alice).unwrap(), 300);
    }

    #[test]
    fn test_paused_vault_rejects_movement() {
        let (mut ledger, mut vault, _, alice) = setup();
        vault.set_paused(true);
        assert!(matches!(
            vault.deposit(&mut ledger, &alice, 10, &alice),
            Err(AutoYieldError::VaultPaused { .. })
        ));
        assert_eq!(vault.max_withdraw(&ledger, &alice).unwrap(), 0);
    }

    #[test]
    fn test_zero_address_rejected() {
        assert!(matches!(
            InMemoryVault::new(Address::ZERO, Address::from_label("usdc")),
            Err(AutoYieldError::ZeroAddress { .. })
        ));
    }
}
