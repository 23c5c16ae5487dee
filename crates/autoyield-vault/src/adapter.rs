//! Adapter: one vault, many depositors
//!
//! The adapter holds the vault shares in its own name and tracks which
//! depositor owns how many of them. Share counts are the ground truth for
//! accounting; asset values are always derived from the live vault rate.

use std::collections::BTreeMap;

use autoyield_ledger::TokenLedger;
use autoyield_types::{Address, Assets, AutoYieldError, Event, Result, Shares};
use serde::{Deserialize, Serialize};

use crate::VaultOracle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adapter {
    address: Address,
    vault: Address,
    asset: Address,
    shares: BTreeMap<Address, Shares>,
    total_shares_held: Shares,
}

impl Adapter {
    /// Bind a new adapter to `vault` (whose underlying is `asset`) for life
    pub fn new(address: Address, vault: Address, asset: Address) -> Result<Self> {
        for (role, addr) in [("adapter", address), ("vault", vault), ("asset", asset)] {
            if addr.is_zero() {
                return Err(AutoYieldError::ZeroAddress {
                    role: role.to_string(),
                });
            }
        }
        Ok(Self {
            address,
            vault,
            asset,
            shares: BTreeMap::new(),
            total_shares_held: 0,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn vault(&self) -> Address {
        self.vault
    }

    pub fn asset(&self) -> Address {
        self.asset
    }

    pub fn shares_of(&self, depositor: &Address) -> Shares {
        self.shares.get(depositor).copied().unwrap_or(0)
    }

    pub fn total_shares_held(&self) -> Shares {
        self.total_shares_held
    }

    /// Sum of every depositor entry; equals `total_shares_held`
    pub fn ledger_sum(&self) -> Shares {
        self.shares.values().sum()
    }

    fn bound_to(&self, vault: &dyn VaultOracle) -> Result<()> {
        if vault.address() != self.vault {
            return Err(AutoYieldError::InvariantViolated {
                reason: format!(
                    "adapter {} is bound to vault {}, not {}",
                    self.address,
                    self.vault,
                    vault.address()
                ),
            });
        }
        Ok(())
    }

    fn ensure_active(&self, vault: &dyn VaultOracle) -> Result<()> {
        if vault.is_paused() {
            return Err(AutoYieldError::VaultPaused { vault: self.vault });
        }
        Ok(())
    }

    fn credit(&mut self, depositor: &Address, shares: Shares) -> Result<()> {
        let entry = self.shares_of(depositor);
        let new_entry = entry
            .checked_add(shares)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        let new_total = self
            .total_shares_held
            .checked_add(shares)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        self.shares.insert(*depositor, new_entry);
        self.total_shares_held = new_total;
        Ok(())
    }

    fn debit(&mut self, depositor: &Address, shares: Shares) -> Result<()> {
        let available = self.shares_of(depositor);
        if available < shares {
            return Err(AutoYieldError::InsufficientShares {
                available,
                required: shares,
            });
        }
        let remaining = available - shares;
        if remaining == 0 {
            self.shares.remove(depositor);
        } else {
            self.shares.insert(*depositor, remaining);
        }
        self.total_shares_held -= shares;
        Ok(())
    }

    /// Pull `amount` from `caller` into the vault, crediting the minted shares.
    ///
    /// A deposit the vault would refuse (paused, or too small to mint a
    /// share) fails before any balance moves.
    pub fn deposit(
        &mut self,
        vault: &mut dyn VaultOracle,
        ledger: &mut TokenLedger,
        caller: &Address,
        amount: Assets,
        events: &mut Vec<Event>,
    ) -> Result<Shares> {
        if amount == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        self.bound_to(vault)?;
        self.ensure_active(vault)?;
        if vault.preview_deposit(ledger, amount)? == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }

        ledger.transfer(&self.asset, caller, &self.address, amount)?;
        let shares = match vault.deposit(ledger, &self.address, amount, &self.address) {
            Ok(shares) => shares,
            Err(e) => {
                ledger.transfer(&self.asset, &self.address, caller, amount)?;
                return Err(e);
            }
        };
        self.credit(caller, shares)?;

        tracing::debug!(adapter = %self.address, depositor = %caller, amount, shares, "deposited");
        events.push(Event::Deposited {
            adapter: self.address,
            depositor: *caller,
            assets: amount,
            shares,
        });
        Ok(shares)
    }

    /// Withdraw `amount` of underlying for `caller`.
    ///
    /// Shares to burn are computed up front, rounding up; the ledger is
    /// debited before the vault is touched and re-credited if the vault
    /// refuses. The caller receives what the vault actually returned.
    pub fn withdraw(
        &mut self,
        vault: &mut dyn VaultOracle,
        ledger: &mut TokenLedger,
        caller: &Address,
        amount: Assets,
        events: &mut Vec<Event>,
    ) -> Result<Assets> {
        if amount == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        self.bound_to(vault)?;

        let shares_to_burn = vault.preview_withdraw(ledger, amount)?;
        let held = self.shares_of(caller);
        if held < shares_to_burn {
            return Err(AutoYieldError::InsufficientShares {
                available: held,
                required: shares_to_burn,
            });
        }
        self.ensure_active(vault)?;
        let limit = vault.max_withdraw(ledger, &self.address)?;
        if amount > limit {
            return Err(AutoYieldError::VaultIlliquid {
                vault: self.vault,
                requested: amount,
                available: limit,
            });
        }

        self.debit(caller, shares_to_burn)?;
        let before = ledger.balance_of(&self.asset, &self.address);
        let burned = match vault.withdraw(ledger, amount, &self.address, &self.address) {
            Ok(burned) => burned,
            Err(e) => {
                self.credit(caller, shares_to_burn)?;
                return Err(e);
            }
        };
        if burned != shares_to_burn {
            return Err(AutoYieldError::InvariantViolated {
                reason: format!("vault burned {} shares, expected {}", burned, shares_to_burn),
            });
        }
        let received = ledger
            .balance_of(&self.asset, &self.address)
            .saturating_sub(before);
        if received > 0 {
            ledger.transfer(&self.asset, &self.address, caller, received)?;
        }

        tracing::debug!(adapter = %self.address, depositor = %caller, received, shares = burned, "withdrawn");
        events.push(Event::Withdrawn {
            adapter: self.address,
            depositor: *caller,
            assets: received,
            shares: burned,
        });
        Ok(received)
    }

    /// Redeem every share `caller` holds. Returns the assets received.
    pub fn redeem_all(
        &mut self,
        vault: &mut dyn VaultOracle,
        ledger: &mut TokenLedger,
        caller: &Address,
        events: &mut Vec<Event>,
    ) -> Result<Assets> {
        self.bound_to(vault)?;
        let shares = self.shares_of(caller);
        if shares == 0 {
            return Ok(0);
        }
        self.ensure_active(vault)?;
        let value = vault.preview_redeem(ledger, shares)?;
        let idle = vault.idle_assets(ledger);
        if value > idle {
            return Err(AutoYieldError::VaultIlliquid {
                vault: self.vault,
                requested: value,
                available: idle,
            });
        }

        self.debit(caller, shares)?;
        let received = match vault.redeem(ledger, shares, &self.address, &self.address) {
            Ok(received) => received,
            Err(e) => {
                self.credit(caller, shares)?;
                return Err(e);
            }
        };
        if received > 0 {
            ledger.transfer(&self.asset, &self.address, caller, received)?;
        }

        tracing::debug!(adapter = %self.address, depositor = %caller, received, shares, "redeemed");
        events.push(Event::Withdrawn {
            adapter: self.address,
            depositor: *caller,
            assets: received,
            shares,
        });
        Ok(received)
    }

    /// Value of `depositor`'s shares at the live rate
    pub fn total_value(
        &self,
        vault: &dyn VaultOracle,
        ledger: &TokenLedger,
        depositor: &Address,
    ) -> Result<Assets> {
        self.bound_to(vault)?;
        vault.convert_to_assets(ledger, self.shares_of(depositor))
    }

    pub fn preview_deposit(
        &self,
        vault: &dyn VaultOracle,
        ledger: &TokenLedger,
        amount: Assets,
    ) -> Result<Shares> {
        self.bound_to(vault)?;
        vault.preview_deposit(ledger, amount)
    }

    pub fn preview_withdraw(
        &self,
        vault: &dyn VaultOracle,
        ledger: &TokenLedger,
        amount: Assets,
    ) -> Result<Shares> {
        self.bound_to(vault)?;
        vault.preview_withdraw(ledger, amount)
    }

    /// Largest amount `depositor` can withdraw right now:
    /// min(value of their shares, vault idle liquidity)
    pub fn max_withdraw(
        &self,
        vault: &dyn VaultOracle,
        ledger: &TokenLedger,
        depositor: &Address,
    ) -> Result<Assets> {
        self.bound_to(vault)?;
        let value = vault.convert_to_assets(ledger, self.shares_of(depositor))?;
        let limit = vault.max_withdraw(ledger, &self.address)?;
        Ok(value.min(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryVault;

    struct World {
        ledger: TokenLedger,
        vault: InMemoryVault,
        adapter: Adapter,
        events: Vec<Event>,
        usdc: Address,
    }

    fn world() -> World {
        let usdc = Address::from_label("usdc");
        let vault_addr = Address::from_label("vault");
        let mut ledger = TokenLedger::new();
        for who in ["alice", "bob"] {
            ledger.mint(&usdc, &Address::from_label(who), 10_000).unwrap();
        }
        World {
            ledger,
            vault: InMemoryVault::new(vault_addr, usdc).unwrap(),
            adapter: Adapter::new(Address::from_label("adapter"), vault_addr, usdc).unwrap(),
            events: Vec::new(),
            usdc,
        }
    }

    fn assert_conserved(w: &World) {
        assert_eq!(w.adapter.ledger_sum(), w.adapter.total_shares_held());
        assert_eq!(w.vault.balance_of(&w.adapter.address()), w.adapter.total_shares_held());
    }

    #[test]
    fn test_deposit_credits_shares() {
        let mut w = world();
        let alice = Address::from_label("alice");
        let shares = w
            .adapter
            .deposit(&mut w.vault, &mut w.ledger, &alice, 1_000, &mut w.events)
            .unwrap();

        assert_eq!(shares, 1_000);
        assert_eq!(w.adapter.shares_of(&alice), 1_000);
        assert_eq!(
            w.adapter.total_value(&w.vault, &w.ledger, &alice).unwrap(),
            1_000
        );
        assert!(matches!(w.events[0], Event::Deposited { assets: 1_000, shares: 1_000, .. }));
        assert_conserved(&w);
    }

    #[test]
    fn test_conservation_across_depositors() {
        let mut w = world();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 1_000, &mut w.events).unwrap();
        assert_conserved(&w);
        w.vault.accrue(&mut w.ledger, 37).unwrap();
        w.adapter.deposit(&mut w.vault, &mut w.ledger, &bob, 333, &mut w.events).unwrap();
        assert_conserved(&w);
        w.adapter.withdraw(&mut w.vault, &mut w.ledger, &alice, 501, &mut w.events).unwrap();
        assert_conserved(&w);
        w.adapter.withdraw(&mut w.vault, &mut w.ledger, &bob, 100, &mut w.events).unwrap();
        assert_conserved(&w);
        w.adapter.redeem_all(&mut w.vault, &mut w.ledger, &alice, &mut w.events).unwrap();
        assert_conserved(&w);
        assert_eq!(w.adapter.shares_of(&alice), 0);
    }

    #[test]
    fn test_withdraw_exceeding_ledger_fails_unchanged() {
        let mut w = world();
        let alice = Address::from_label("alice");
        w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 1_000, &mut w.events).unwrap();
        let usdc_before = w.ledger.balance_of(&w.usdc, &alice);

        let result = w
            .adapter
            .withdraw(&mut w.vault, &mut w.ledger, &alice, 1_001, &mut w.events);

        assert!(matches!(
            result,
            Err(AutoYieldError::InsufficientShares { available: 1_000, required: 1_001 })
        ));
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(w.adapter.shares_of(&alice), 1_000);
        assert_eq!(w.adapter.total_shares_held(), 1_000);
        assert_eq!(w.ledger.balance_of(&w.usdc, &alice), usdc_before);
        assert_eq!(w.events.len(), 1);
    }

    #[test]
    fn test_withdraw_rounds_against_withdrawer() {
        let mut w = world();
        let alice = Address::from_label("alice");
        w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 1_000, &mut w.events).unwrap();
        w.vault.accrue(&mut w.ledger, 100).unwrap();

        let expected_burn = w.adapter.preview_withdraw(&w.vault, &w.ledger, 500).unwrap();
        w.adapter.withdraw(&mut w.vault, &mut w.ledger, &alice, 500, &mut w.events).unwrap();
        assert_eq!(w.adapter.shares_of(&alice), 1_000 - expected_burn);
        // 500 * 1001 / 1101 = 454.6 rounds up
        assert_eq!(expected_burn, 455);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let mut w = world();
        let alice = Address::from_label("alice");
        assert_eq!(
            w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 0, &mut w.events),
            Err(AutoYieldError::ZeroAmount)
        );
        assert_eq!(
            w.adapter.withdraw(&mut w.vault, &mut w.ledger, &alice, 0, &mut w.events),
            Err(AutoYieldError::ZeroAmount)
        );
    }

    #[test]
    fn test_zero_vault_rejected() {
        assert!(matches!(
            Adapter::new(Address::from_label("adapter"), Address::ZERO, Address::from_label("usdc")),
            Err(AutoYieldError::ZeroAddress { .. })
        ));
    }

    #[test]
    fn test_max_withdraw_respects_liquidity() {
        let mut w = world();
        let alice = Address::from_label("alice");
        w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 1_000, &mut w.events).unwrap();
        w.vault.deploy(&mut w.ledger, 700).unwrap();
        assert_eq!(w.adapter.max_withdraw(&w.vault, &w.ledger, &alice).unwrap(), 300);
        assert!(matches!(
            w.adapter.withdraw(&mut w.vault, &mut w.ledger, &alice, 301, &mut w.events),
            Err(AutoYieldError::VaultIlliquid { .. })
        ));
        assert_eq!(w.adapter.shares_of(&alice), 1_000);
    }

    #[test]
    fn test_paused_vault_withdraw_keeps_shares() {
        let mut w = world();
        let alice = Address::from_label("alice");
        w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 1_000, &mut w.events).unwrap();
        w.vault.set_paused(true);
        let usdc_before = w.ledger.balance_of(&w.usdc, &alice);

        assert!(matches!(
            w.adapter.withdraw(&mut w.vault, &mut w.ledger, &alice, 500, &mut w.events),
            Err(AutoYieldError::VaultPaused { .. })
        ));
        assert!(matches!(
            w.adapter.redeem_all(&mut w.vault, &mut w.ledger, &alice, &mut w.events),
            Err(AutoYieldError::VaultPaused { .. })
        ));
        assert_eq!(w.adapter.shares_of(&alice), 1_000);
        assert_eq!(w.adapter.total_shares_held(), 1_000);
        assert_eq!(w.ledger.balance_of(&w.usdc, &alice), usdc_before);
        assert_conserved(&w);

        w.vault.set_paused(false);
        assert_eq!(
            w.adapter.withdraw(&mut w.vault, &mut w.ledger, &alice, 500, &mut w.events).unwrap(),
            500
        );
        assert_conserved(&w);
    }

    #[test]
    fn test_dust_deposit_moves_nothing() {
        let mut w = world();
        let alice = Address::from_label("alice");
        w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 1, &mut w.events).unwrap();
        w.vault.accrue(&mut w.ledger, 5_000).unwrap();
        let usdc_before = w.ledger.balance_of(&w.usdc, &alice);
        let entries_before = w.ledger.entry_count();

        // 10 * 2 / 5002 mints no share
        assert_eq!(
            w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 10, &mut w.events),
            Err(AutoYieldError::ZeroAmount)
        );
        assert_eq!(w.ledger.balance_of(&w.usdc, &alice), usdc_before);
        assert_eq!(w.ledger.balance_of(&w.usdc, &w.adapter.address()), 0);
        assert_eq!(w.ledger.entry_count(), entries_before);
        assert_eq!(w.adapter.shares_of(&alice), 1);
    }

    #[test]
    fn test_paused_vault_deposit_moves_nothing() {
        let mut w = world();
        let alice = Address::from_label("alice");
        w.vault.set_paused(true);

        assert!(matches!(
            w.adapter.deposit(&mut w.vault, &mut w.ledger, &alice, 100, &mut w.events),
            Err(AutoYieldError::VaultPaused { .. })
        ));
        assert_eq!(w.ledger.balance_of(&w.usdc, &alice), 10_000);
        assert_eq!(w.ledger.balance_of(&w.usdc, &w.adapter.address()), 0);
        assert_eq!(w.adapter.total_shares_held(), 0);
        assert!(w.events.is_empty());
    }
}
