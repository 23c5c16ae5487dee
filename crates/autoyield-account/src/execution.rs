//! Executing account actions against chain state
//!
//! Everything here mutates whatever state it is handed; callers run it inside
//! [`ChainState::stage`] so that any error rolls the whole unit back.

use autoyield_router::{RoutingContext, RoutingEngine, RoutingOutcome, RoutingView};
use autoyield_types::{
    AccountAction, Address, Assets, AutoYieldError, Call, CallData, Event, Result, Shares,
};

use crate::ChainState;

/// Read-only balances for one account
pub struct AccountView<'a> {
    state: &'a ChainState,
    account: Address,
}

impl<'a> AccountView<'a> {
    pub fn new(state: &'a ChainState, account: Address) -> Self {
        Self { state, account }
    }
}

impl RoutingView for AccountView<'_> {
    fn checking_balance(&self, token: &Address) -> Assets {
        self.state.ledger.balance_of(token, &self.account)
    }

    fn adapter_asset(&self, adapter: &Address) -> Result<Address> {
        Ok(self.state.adapter(adapter)?.asset())
    }

    fn position_value(&self, adapter: &Address) -> Result<Assets> {
        self.state.position_value(adapter, &self.account)
    }

    fn max_withdraw(&self, adapter: &Address) -> Result<Assets> {
        let adapter = self.state.adapter(adapter)?;
        let vault = self.state.vault(&adapter.vault())?;
        adapter.max_withdraw(vault, &self.state.ledger, &self.account)
    }

    fn preview_deposit(&self, adapter: &Address, amount: Assets) -> Result<Shares> {
        let adapter = self.state.adapter(adapter)?;
        let vault = self.state.vault(&adapter.vault())?;
        adapter.preview_deposit(vault, &self.state.ledger, amount)
    }
}

/// Fund movement for one account over (staged) chain state
pub struct AccountContext<'a> {
    state: &'a mut ChainState,
    account: Address,
}

impl<'a> AccountContext<'a> {
    pub fn new(state: &'a mut ChainState, account: Address) -> Self {
        Self { state, account }
    }

    fn view(&self) -> AccountView<'_> {
        AccountView::new(self.state, self.account)
    }
}

impl RoutingView for AccountContext<'_> {
    fn checking_balance(&self, token: &Address) -> Assets {
        self.view().checking_balance(token)
    }

    fn adapter_asset(&self, adapter: &Address) -> Result<Address> {
        self.view().adapter_asset(adapter)
    }

    fn position_value(&self, adapter: &Address) -> Result<Assets> {
        self.view().position_value(adapter)
    }

    fn max_withdraw(&self, adapter: &Address) -> Result<Assets> {
        self.view().max_withdraw(adapter)
    }

    fn preview_deposit(&self, adapter: &Address, amount: Assets) -> Result<Shares> {
        self.view().preview_deposit(adapter, amount)
    }
}

impl RoutingContext for AccountContext<'_> {
    fn withdraw(&mut self, adapter: &Address, amount: Assets) -> Result<Assets> {
        let state = &mut *self.state;
        let adapter = state
            .adapters
            .get_mut(adapter)
            .ok_or(AutoYieldError::UnknownAdapter { adapter: *adapter })?;
        let vault = state
            .vaults
            .get_mut(&adapter.vault())
            .ok_or(AutoYieldError::UnknownVault { vault: adapter.vault() })?;
        adapter.withdraw(vault, &mut state.ledger, &self.account, amount, &mut state.events)
    }

    fn deposit(&mut self, adapter: &Address, amount: Assets) -> Result<Shares> {
        let state = &mut *self.state;
        let adapter = state
            .adapters
            .get_mut(adapter)
            .ok_or(AutoYieldError::UnknownAdapter { adapter: *adapter })?;
        let vault = state
            .vaults
            .get_mut(&adapter.vault())
            .ok_or(AutoYieldError::UnknownVault { vault: adapter.vault() })?;
        adapter.deposit(vault, &mut state.ledger, &self.account, amount, &mut state.events)
    }

    fn redeem_all(&mut self, adapter: &Address) -> Result<Assets> {
        let state = &mut *self.state;
        let adapter = state
            .adapters
            .get_mut(adapter)
            .ok_or(AutoYieldError::UnknownAdapter { adapter: *adapter })?;
        let vault = state
            .vaults
            .get_mut(&adapter.vault())
            .ok_or(AutoYieldError::UnknownVault { vault: adapter.vault() })?;
        adapter.redeem_all(vault, &mut state.ledger, &self.account, &mut state.events)
    }

    fn execute(&mut self, call: &Call) -> Result<()> {
        self.state.execute_call(&self.account, call)
    }

    fn emit(&mut self, event: Event) {
        self.state.events.push(event);
    }
}

impl ChainState {
    /// Apply `action` on behalf of `account`.
    ///
    /// Authorization happened before this point.
    pub fn execute_action(&mut self, account: &Address, action: &AccountAction) -> Result<()> {
        tracing::debug!(account = %account, action = action.name(), "executing action");
        match action {
            AccountAction::Execute(call) => self.execute_call(account, call),
            AccountAction::ExecuteWithAutoYield { token, call } => self
                .with_routing(account, |engine, ctx| {
                    engine.execute_with_auto_yield(ctx, token, call)
                })
                .map(|_| ()),
            AccountAction::Rebalance { token } => self
                .with_routing(account, |engine, ctx| engine.rebalance(ctx, token))
                .map(|_| ()),
            AccountAction::FlushToChecking { token } => self
                .with_routing(account, |engine, ctx| engine.flush_to_checking(ctx, token))
                .map(|_| ()),
            AccountAction::SetCheckingThreshold { token, threshold } => {
                self.with_routing(account, |engine, ctx| {
                    engine.set_checking_threshold(ctx, token, *threshold)
                })
            }
            AccountAction::SetActiveAdapter { token, adapter } => self
                .with_routing(account, |engine, ctx| {
                    engine.set_active_adapter(ctx, token, adapter)
                }),
            AccountAction::ClearRouting { token } => self
                .with_routing(account, |engine, ctx| engine.clear_routing(ctx, token))
                .map(|_| ()),
            AccountAction::SetAutomationKey { key } => {
                self.with_routing(account, |engine, ctx| engine.set_automation_key(ctx, *key))
            }
            AccountAction::InstallModule {
                module_type,
                module,
                init_data,
            } => {
                let kind = self.catalog.get(module)?;
                let record = self
                    .accounts
                    .get_mut(account)
                    .ok_or(AutoYieldError::AccountNotFound { account: *account })?;
                record.modules.install(
                    account,
                    *module_type,
                    module,
                    kind,
                    init_data,
                    &mut self.events,
                )
            }
            AccountAction::UninstallModule {
                module_type,
                module,
                deinit_data,
            } => {
                let record = self
                    .accounts
                    .get_mut(account)
                    .ok_or(AutoYieldError::AccountNotFound { account: *account })?;
                record
                    .modules
                    .uninstall(account, *module_type, module, deinit_data, &mut self.events)
            }
        }
    }

    /// Rebalance `token` through an installed executor module
    pub fn execute_from_executor(
        &mut self,
        executor: &Address,
        account: &Address,
        token: &Address,
    ) -> Result<RoutingOutcome> {
        self.account(account)?
            .modules
            .authorize_executor(executor, token)?;
        self.with_routing(account, |engine, ctx| engine.rebalance(ctx, token))
    }

    /// Lend the account's routing engine to `f` together with a fund
    /// movement context over this state
    fn with_routing<R>(
        &mut self,
        account: &Address,
        f: impl FnOnce(&mut RoutingEngine, &mut AccountContext<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut engine = std::mem::take(&mut self.account_mut(account)?.routing);
        let result = {
            let mut ctx = AccountContext::new(self, *account);
            f(&mut engine, &mut ctx)
        };
        self.account_mut(account)?.routing = engine;
        result
    }

    /// Run `call` from `from` with every installed hook around it
    pub(crate) fn execute_call(&mut self, from: &Address, call: &Call) -> Result<()> {
        self.account(from)?.modules.pre_execute(call)?;
        self.perform_call(from, call)?;
        self.account_mut(from)?.modules.post_execute(call);

        tracing::debug!(account = %from, to = %call.to, value = call.value, "call executed");
        self.events.push(Event::Executed {
            account: *from,
            to: call.to,
            value: call.value,
        });
        Ok(())
    }

    fn perform_call(&mut self, from: &Address, call: &Call) -> Result<()> {
        if call.to.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "call target".to_string(),
            });
        }
        let before = self.ledger.holdings(from);

        if call.value > 0 {
            self.ledger
                .transfer(&Address::NATIVE, from, &call.to, call.value)?;
        }

        match &call.data {
            CallData::Empty => {}
            CallData::TokenTransfer { recipient, amount } => {
                if !self.is_token(&call.to) {
                    return Err(AutoYieldError::CallFailed {
                        to: call.to,
                        reason: "not a token".to_string(),
                    });
                }
                self.ledger.transfer(&call.to, from, recipient, *amount)?;
            }
            CallData::Invoke {
                selector, payload, ..
            } => {
                if let Some(account) = self.accounts.get(&call.to) {
                    account.modules.handle_fallback(&call.to, selector)?;
                } else if let Some(target) = self.targets.get_mut(&call.to) {
                    target.invoke(&mut self.ledger, from, selector, payload)?;
                } else {
                    return Err(AutoYieldError::CallFailed {
                        to: call.to,
                        reason: "no contract at address".to_string(),
                    });
                }
            }
        }

        // A call may not take more than it declared
        for (token, held_before) in before {
            let spent = held_before.saturating_sub(self.ledger.balance_of(&token, from));
            let allowed = call
                .required_debit(&token)
                .ok_or(AutoYieldError::ArithmeticOverflow)?;
            if spent > allowed {
                return Err(AutoYieldError::CallFailed {
                    to: call.to,
                    reason: format!("spent {} of {} but declared {}", spent, token, allowed),
                });
            }
        }
        Ok(())
    }
}
