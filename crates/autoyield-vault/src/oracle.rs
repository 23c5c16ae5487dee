//! The external vault interface

use std::fmt;

use autoyield_ledger::TokenLedger;
use autoyield_types::{Address, Assets, Result, Shares};

/// An external yield vault.
///
/// Balances of the underlying asset live in the shared [`TokenLedger`], so
/// every query and mutation is handed the ledger it reads from. Withdrawal
/// and redemption are fallible: the vault may be paused or short on idle
/// liquidity.
pub trait VaultOracle: Send + Sync + fmt::Debug {
    /// Address of the vault
    fn address(&self) -> Address;

    /// Underlying asset token
    fn asset(&self) -> Address;

    /// Underlying assets under management (idle + deployed)
    fn total_assets(&self, ledger: &TokenLedger) -> Assets;

    /// Outstanding vault shares
    fn total_supply(&self) -> Shares;

    /// Shares held by `owner`
    fn balance_of(&self, owner: &Address) -> Shares;

    /// Whether deposits and withdrawals are currently refused
    fn is_paused(&self) -> bool;

    /// Assets available for immediate withdrawal
    fn idle_assets(&self, ledger: &TokenLedger) -> Assets;

    fn convert_to_shares(&self, ledger: &TokenLedger, assets: Assets) -> Result<Shares>;

    fn convert_to_assets(&self, ledger: &TokenLedger, shares: Shares) -> Result<Assets>;

    /// Shares minted for depositing `assets` (rounds down)
    fn preview_deposit(&self, ledger: &TokenLedger, assets: Assets) -> Result<Shares>;

    /// Shares burned to withdraw exactly `assets` (rounds up)
    fn preview_withdraw(&self, ledger: &TokenLedger, assets: Assets) -> Result<Shares>;

    /// Assets returned for redeeming `shares` (rounds down)
    fn preview_redeem(&self, ledger: &TokenLedger, shares: Shares) -> Result<Assets>;

    /// Assets `owner` can withdraw right now
    fn max_withdraw(&self, ledger: &TokenLedger, owner: &Address) -> Result<Assets>;

    /// Pull `assets` from `caller`, mint shares to `receiver`
    fn deposit(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &Address,
        assets: Assets,
        receiver: &Address,
    ) -> Result<Shares>;

    /// Burn `owner`'s shares and send exactly `assets` to `receiver`.
    /// Returns the shares burned.
    fn withdraw(
        &mut self,
        ledger: &mut TokenLedger,
        assets: Assets,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Shares>;

    /// Burn exactly `shares` of `owner` and send their value to `receiver`.
    /// Returns the assets sent.
    fn redeem(
        &mut self,
        ledger: &mut TokenLedger,
        shares: Shares,
        receiver: &Address,
        owner: &Address,
    ) -> Result<Assets>;
}
