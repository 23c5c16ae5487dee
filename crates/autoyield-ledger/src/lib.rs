//! AutoYield Ledger - Token balances for every holder
//!
//! The ledger is:
//! - Token-scoped (the native coin is `Address::NATIVE`)
//! - Holder-keyed by address (accounts, vaults, adapters, merchants)
//! - Immutable history (entries are append-only)
//! - Plain data: cloning it is how a unit of work is staged
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. A transfer debits and credits the same amount, or does nothing
//! 4. `sum(balances of token) == supply(token)`

use std::collections::BTreeMap;

use autoyield_types::{Address, Assets, AutoYieldError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Increase of a holder's balance
    Credit,
    /// Decrease of a holder's balance
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// New supply (faucet, yield accrual)
    Mint,
    /// Destroyed supply
    Burn,
    /// Movement between two holders
    Transfer { counterparty: Address },
}

/// A single ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub holder: Address,
    pub token: Address,
    pub entry_type: EntryType,
    pub amount: Assets,
    pub balance_after: Assets,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

/// The token ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenLedger {
    /// (token, holder) -> balance
    balances: BTreeMap<(Address, Address), Assets>,
    supply: BTreeMap<Address, Assets>,
    entries: Vec<LedgerEntry>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `holder` in `token`
    pub fn balance_of(&self, token: &Address, holder: &Address) -> Assets {
        self.balances.get(&(*token, *holder)).copied().unwrap_or(0)
    }

    /// Total outstanding supply of `token`
    pub fn total_supply(&self, token: &Address) -> Assets {
        self.supply.get(token).copied().unwrap_or(0)
    }

    /// Every non-zero balance held by `holder`
    pub fn holdings(&self, holder: &Address) -> BTreeMap<Address, Assets> {
        self.balances
            .iter()
            .filter(|((_, h), amount)| h == holder && **amount > 0)
            .map(|((token, _), amount)| (*token, *amount))
            .collect()
    }

    /// Create new supply for `to`
    pub fn mint(&mut self, token: &Address, to: &Address, amount: Assets) -> Result<Assets> {
        if amount == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        let supply = self
            .total_supply(token)
            .checked_add(amount)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        let balance = self.credit(token, to, amount, EntryReason::Mint)?;
        self.supply.insert(*token, supply);
        tracing::debug!(token = %token, to = %to, amount, "minted");
        Ok(balance)
    }

    /// Destroy supply held by `from`
    pub fn burn(&mut self, token: &Address, from: &Address, amount: Assets) -> Result<Assets> {
        if amount == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        let balance = self.debit(token, from, amount, EntryReason::Burn)?;
        let supply = self.total_supply(token).saturating_sub(amount);
        self.supply.insert(*token, supply);
        Ok(balance)
    }

    /// Move `amount` of `token` from `from` to `to`.
    ///
    /// Atomic: the balance check happens before either side is touched.
    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Assets,
    ) -> Result<()> {
        if amount == 0 {
            return Err(AutoYieldError::ZeroAmount);
        }
        if to.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "transfer recipient".to_string(),
            });
        }
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(AutoYieldError::InsufficientBalance {
                token: *token,
                holder: *from,
                available,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        self.debit(token, from, amount, EntryReason::Transfer { counterparty: *to })?;
        self.credit(token, to, amount, EntryReason::Transfer { counterparty: *from })?;
        Ok(())
    }

    fn credit(
        &mut self,
        token: &Address,
        holder: &Address,
        amount: Assets,
        reason: EntryReason,
    ) -> Result<Assets> {
        let new_balance = self
            .balance_of(token, holder)
            .checked_add(amount)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;
        self.balances.insert((*token, *holder), new_balance);
        self.record(token, holder, EntryType::Credit, amount, new_balance, reason);
        Ok(new_balance)
    }

    fn debit(
        &mut self,
        token: &Address,
        holder: &Address,
        amount: Assets,
        reason: EntryReason,
    ) -> Result<Assets> {
        let current = self.balance_of(token, holder);
        let new_balance =
            current
                .checked_sub(amount)
                .ok_or(AutoYieldError::InsufficientBalance {
                    token: *token,
                    holder: *holder,
                    available: current,
                    required: amount,
                })?;
        self.balances.insert((*token, *holder), new_balance);
        self.record(token, holder, EntryType::Debit, amount, new_balance, reason);
        Ok(new_balance)
    }

    fn record(
        &mut self,
        token: &Address,
        holder: &Address,
        entry_type: EntryType,
        amount: Assets,
        balance_after: Assets,
        reason: EntryReason,
    ) {
        let entry = LedgerEntry {
            sequence: self.entries.len() as u64,
            holder: *holder,
            token: *token,
            entry_type,
            amount,
            balance_after,
            reason,
            created_at: Utc::now(),
        };
        self.entries.push(entry);
    }

    /// Get all entries for a holder
    pub fn holder_entries(&self, holder: &Address) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| &e.holder == holder)
            .cloned()
            .collect()
    }

    /// Get the total number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Move the entry log out, leaving an empty history behind
    pub fn take_history(&mut self) -> Vec<LedgerEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Reattach a log from [`TokenLedger::take_history`], keeping its first
    /// `len` entries
    pub fn restore_history(&mut self, mut entries: Vec<LedgerEntry>, len: usize) {
        entries.truncate(len);
        self.entries = entries;
    }

    /// Get recent entries (newest first)
    pub fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Sum of all balances of `token`; equals `total_supply` when consistent
    pub fn sum_of_balances(&self, token: &Address) -> Assets {
        self.balances
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> Address {
        Address::from_label("usdc")
    }

    #[test]
    fn test_mint_and_balance() {
        let mut ledger = TokenLedger::new();
        let alice = Address::from_label("alice");

        assert_eq!(ledger.mint(&usdc(), &alice, 1_000).unwrap(), 1_000);
        assert_eq!(ledger.balance_of(&usdc(), &alice), 1_000);
        assert_eq!(ledger.total_supply(&usdc()), 1_000);
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn test_transfer_conserves_supply() {
        let mut ledger = TokenLedger::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        ledger.mint(&usdc(), &alice, 1_000).unwrap();

        ledger.transfer(&usdc(), &alice, &bob, 400).unwrap();

        assert_eq!(ledger.balance_of(&usdc(), &alice), 600);
        assert_eq!(ledger.balance_of(&usdc(), &bob), 400);
        assert_eq!(ledger.sum_of_balances(&usdc()), ledger.total_supply(&usdc()));

        let bob_entries = ledger.holder_entries(&bob);
        assert_eq!(bob_entries.len(), 1);
        assert_eq!(bob_entries[0].entry_type, EntryType::Credit);
        assert_eq!(
            bob_entries[0].reason,
            EntryReason::Transfer { counterparty: alice }
        );
    }

    #[test]
    fn test_insufficient_balance_leaves_ledger_untouched() {
        let mut ledger = TokenLedger::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        ledger.mint(&usdc(), &alice, 100).unwrap();

        let result = ledger.transfer(&usdc(), &alice, &bob, 101);
        assert!(matches!(
            result,
            Err(AutoYieldError::InsufficientBalance { available: 100, required: 101, .. })
        ));
        assert_eq!(ledger.balance_of(&usdc(), &alice), 100);
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut ledger = TokenLedger::new();
        let alice = Address::from_label("alice");
        assert_eq!(ledger.mint(&usdc(), &alice, 0), Err(AutoYieldError::ZeroAmount));
        assert_eq!(
            ledger.transfer(&usdc(), &alice, &alice, 0),
            Err(AutoYieldError::ZeroAmount)
        );
    }

    #[test]
    fn test_burn_reduces_supply() {
        let mut ledger = TokenLedger::new();
        let alice = Address::from_label("alice");
        ledger.mint(&Address::NATIVE, &alice, 50).unwrap();
        ledger.burn(&Address::NATIVE, &alice, 20).unwrap();
        assert_eq!(ledger.total_supply(&Address::NATIVE), 30);
        assert_eq!(ledger.holdings(&alice).get(&Address::NATIVE), Some(&30));
    }
}
