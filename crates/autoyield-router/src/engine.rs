//! Threshold routing

use std::collections::BTreeMap;

use autoyield_types::{Address, Assets, AutoYieldError, Call, Event, Result};
use serde::{Deserialize, Serialize};

use crate::{RoutingConfig, RoutingContext, RoutingOutcome, RoutingStatus, RoutingView};

/// Routing state and decisions for one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEngine {
    account: Address,
    configs: BTreeMap<Address, RoutingConfig>,
    automation_key: Option<Address>,
}

impl RoutingEngine {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            configs: BTreeMap::new(),
            automation_key: None,
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Configuration for `token`; unconfigured tokens route with threshold 0
    /// and no adapter
    pub fn config(&self, token: &Address) -> RoutingConfig {
        self.configs.get(token).cloned().unwrap_or_default()
    }

    pub fn configured_tokens(&self) -> impl Iterator<Item = &Address> {
        self.configs.keys()
    }

    pub fn automation_key(&self) -> Option<Address> {
        self.automation_key
    }

    /// Automation key permitted to route `token`
    pub fn automation_key_for(&self, token: &Address) -> Option<Address> {
        self.configs.get(token).and(self.automation_key)
    }

    pub fn status<V: RoutingView + ?Sized>(&self, view: &V, token: &Address) -> Result<RoutingStatus> {
        let config = self.config(token);
        let yield_value = match &config.active_adapter {
            Some(adapter) => view.position_value(adapter)?,
            None => 0,
        };
        Ok(RoutingStatus {
            token: *token,
            checking: view.checking_balance(token),
            yield_value,
            threshold: config.checking_threshold,
            adapter: config.active_adapter,
        })
    }

    // ========================================================================
    // Fund movement
    // ========================================================================

    /// Top up checking for `call`, run it, then sweep the surplus into yield.
    ///
    /// A deficit that the adapter cannot cover fails the whole unit.
    pub fn execute_with_auto_yield<C: RoutingContext + ?Sized>(
        &self,
        ctx: &mut C,
        token: &Address,
        call: &Call,
    ) -> Result<RoutingOutcome> {
        let config = self.config(token);
        let needed = call
            .required_debit(token)
            .ok_or(AutoYieldError::ArithmeticOverflow)?;

        // Phase 1: top up
        let checking = ctx.checking_balance(token);
        let mut pulled = 0;
        if needed > checking {
            if let Some(adapter) = &config.active_adapter {
                let deficit = needed - checking;
                pulled = ctx.withdraw(adapter, deficit)?;
                tracing::debug!(account = %self.account, token = %token, deficit, pulled, "topped up checking");
            }
        }

        // Phase 2: the call itself
        ctx.execute(call)?;

        // Phase 3: sweep
        let pushed = self.sweep(ctx, token, &config)?;

        let outcome = RoutingOutcome {
            pulled,
            pushed,
            checking_after: ctx.checking_balance(token),
        };
        tracing::debug!(account = %self.account, token = %token, ?outcome, "executed with auto-yield");
        Ok(outcome)
    }

    /// Clamp checking as close to the threshold as liquidity allows
    pub fn rebalance<C: RoutingContext + ?Sized>(&self, ctx: &mut C, token: &Address) -> Result<RoutingOutcome> {
        let config = self.config(token);
        let Some(adapter) = config.active_adapter else {
            return Ok(RoutingOutcome {
                checking_after: ctx.checking_balance(token),
                ..Default::default()
            });
        };

        let checking = ctx.checking_balance(token);
        let mut pulled = 0;
        if checking < config.checking_threshold {
            let deficit = config.checking_threshold - checking;
            let available = ctx.max_withdraw(&adapter)?;
            let amount = deficit.min(available);
            if amount > 0 {
                pulled = ctx.withdraw(&adapter, amount)?;
            }
            if amount < deficit {
                tracing::warn!(account = %self.account, token = %token, deficit, available, "adapter liquidity short of threshold");
            }
        }
        let pushed = self.sweep(ctx, token, &config)?;

        let outcome = RoutingOutcome {
            pulled,
            pushed,
            checking_after: ctx.checking_balance(token),
        };
        if outcome.moved() {
            tracing::info!(account = %self.account, token = %token, pulled, pushed, checking = outcome.checking_after, "rebalanced");
            ctx.emit(Event::Rebalanced {
                account: self.account,
                token: *token,
                pulled,
                pushed,
                checking_after: outcome.checking_after,
            });
        }
        Ok(outcome)
    }

    /// Withdraw the entire yield position of `token` into checking
    pub fn flush_to_checking<C: RoutingContext + ?Sized>(&self, ctx: &mut C, token: &Address) -> Result<Assets> {
        let Some(adapter) = self.config(token).active_adapter else {
            return Ok(0);
        };
        self.flush(ctx, token, &adapter)
    }

    fn flush<C: RoutingContext + ?Sized>(&self, ctx: &mut C, token: &Address, adapter: &Address) -> Result<Assets> {
        let assets = ctx.redeem_all(adapter)?;
        if assets > 0 {
            tracing::info!(account = %self.account, token = %token, adapter = %adapter, assets, "flushed to checking");
            ctx.emit(Event::Flushed {
                account: self.account,
                token: *token,
                assets,
            });
        }
        Ok(assets)
    }

    /// Phase 3: deposit `checking - threshold` when positive
    fn sweep<C: RoutingContext + ?Sized>(&self, ctx: &mut C, token: &Address, config: &RoutingConfig) -> Result<Assets> {
        let Some(adapter) = &config.active_adapter else {
            return Ok(0);
        };
        let checking = ctx.checking_balance(token);
        if checking <= config.checking_threshold {
            return Ok(0);
        }
        let surplus = checking - config.checking_threshold;
        // Dust that would mint no shares stays in checking
        if ctx.preview_deposit(adapter, surplus)? == 0 {
            return Ok(0);
        }
        ctx.deposit(adapter, surplus)?;
        Ok(surplus)
    }

    // ========================================================================
    // Configuration (owner only)
    // ========================================================================

    pub fn set_checking_threshold<C: RoutingContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        token: &Address,
        threshold: Assets,
    ) -> Result<()> {
        if token.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "token".to_string(),
            });
        }
        self.configs.entry(*token).or_default().checking_threshold = threshold;
        tracing::info!(account = %self.account, token = %token, threshold, "checking threshold set");
        ctx.emit(Event::ThresholdSet {
            account: self.account,
            token: *token,
            threshold,
        });
        Ok(())
    }

    /// Route `token` through `adapter`, flushing any previous adapter first
    pub fn set_active_adapter<C: RoutingContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        token: &Address,
        adapter: &Address,
    ) -> Result<()> {
        if adapter.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "adapter".to_string(),
            });
        }
        let asset = ctx.adapter_asset(adapter)?;
        if asset != *token {
            return Err(AutoYieldError::AdapterAssetMismatch {
                adapter: *adapter,
                expected: *token,
                actual: asset,
            });
        }

        let previous = self.config(token).active_adapter;
        if previous == Some(*adapter) {
            return Ok(());
        }
        if let Some(old) = previous {
            self.flush(ctx, token, &old)?;
        }

        self.configs.entry(*token).or_default().active_adapter = Some(*adapter);
        tracing::info!(account = %self.account, token = %token, adapter = %adapter, "active adapter set");
        ctx.emit(Event::AdapterSet {
            account: self.account,
            token: *token,
            adapter: *adapter,
        });
        Ok(())
    }

    /// Flush `token`'s position and drop its configuration
    pub fn clear_routing<C: RoutingContext + ?Sized>(&mut self, ctx: &mut C, token: &Address) -> Result<Assets> {
        let config = self
            .configs
            .get(token)
            .cloned()
            .ok_or(AutoYieldError::RoutingNotConfigured { token: *token })?;
        let flushed = match &config.active_adapter {
            Some(adapter) => self.flush(ctx, token, adapter)?,
            None => 0,
        };
        self.configs.remove(token);
        tracing::info!(account = %self.account, token = %token, flushed, "routing cleared");
        ctx.emit(Event::RoutingCleared {
            account: self.account,
            token: *token,
        });
        Ok(flushed)
    }

    pub fn set_automation_key<C: RoutingContext + ?Sized>(&mut self, ctx: &mut C, key: Option<Address>) -> Result<()> {
        if matches!(key, Some(k) if k.is_zero()) {
            return Err(AutoYieldError::ZeroAddress {
                role: "automation key".to_string(),
            });
        }
        self.automation_key = key;
        tracing::info!(account = %self.account, key = ?key, "automation key set");
        ctx.emit(Event::AutomationKeySet {
            account: self.account,
            key,
        });
        Ok(())
    }
}
