//! The seam between routing decisions and fund movement

use autoyield_types::{Address, Assets, Call, Event, Result, Shares};

/// Read-only balances and rates seen by the routing engine, for one account
pub trait RoutingView {
    /// The account's spendable balance of `token`
    fn checking_balance(&self, token: &Address) -> Assets;

    /// Underlying asset of a deployed adapter
    fn adapter_asset(&self, adapter: &Address) -> Result<Address>;

    /// Value of the account's shares in `adapter`
    fn position_value(&self, adapter: &Address) -> Result<Assets>;

    /// Largest amount the account can withdraw from `adapter` right now
    fn max_withdraw(&self, adapter: &Address) -> Result<Assets>;

    fn preview_deposit(&self, adapter: &Address, amount: Assets) -> Result<Shares>;
}

/// Fund movement available to the routing engine, on behalf of one account.
///
/// Every mutation is applied to staged state; an `Err` anywhere discards the
/// whole unit.
pub trait RoutingContext: RoutingView {
    /// Withdraw `amount` into checking; returns what actually arrived
    fn withdraw(&mut self, adapter: &Address, amount: Assets) -> Result<Assets>;

    /// Deposit `amount` from checking
    fn deposit(&mut self, adapter: &Address, amount: Assets) -> Result<Shares>;

    /// Redeem the account's entire position into checking
    fn redeem_all(&mut self, adapter: &Address) -> Result<Assets>;

    /// Run `call` from the account's identity
    fn execute(&mut self, call: &Call) -> Result<()>;

    fn emit(&mut self, event: Event);
}
