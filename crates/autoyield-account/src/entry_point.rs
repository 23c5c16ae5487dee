//! Entry point: nonce-guarded, fee-charging execution of signed operations
//!
//! All state sits behind one `tokio` write lock. An operation holds it from
//! validation through execution, so nonce check and consumption can never
//! interleave with another operation on the same account.

use std::sync::Arc;

use async_trait::async_trait;
use autoyield_router::{RoutingOutcome, RoutingStatus};
use autoyield_types::{
    Address, Assets, AutoYieldError, Event, Result, UserOperation,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{AccountFactory, AccountView, ChainState, OperationValidator, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointConfig {
    pub chain_id: u64,
    /// Address operations are bound to and prefunds are held at
    pub address: Address,
    /// Default recipient of operation fees
    pub beneficiary: Address,
    /// Highest fee per gas unit an operation may offer
    pub max_fee_per_gas: u128,
}

impl Default for EntryPointConfig {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            address: Address::from_label("autoyield.entrypoint"),
            beneficiary: Address::from_label("autoyield.beneficiary"),
            max_fee_per_gas: 100,
        }
    }
}

/// Result of an operation that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpReceipt {
    pub op_hash: String,
    pub sender: Address,
    pub nonce: u64,
    pub success: bool,
    pub revert_reason: Option<String>,
    /// Machine-readable reason, see [`AutoYieldError::code`]
    pub error_code: Option<String>,
    /// Whether the revert may succeed if submitted again later
    pub retryable: bool,
    pub cost: Assets,
    pub payer: Address,
    pub events: Vec<Event>,
}

/// Somewhere signed operations can be submitted
#[async_trait]
pub trait OperationRelay: Send + Sync {
    async fn submit(&self, op: UserOperation) -> Result<OpReceipt>;

    async fn next_nonce(&self, account: &Address) -> u64;

    fn config(&self) -> &EntryPointConfig;
}

#[derive(Debug, Clone)]
pub struct EntryPoint {
    config: EntryPointConfig,
    factory: AccountFactory,
    state: Arc<RwLock<ChainState>>,
}

impl EntryPoint {
    pub fn new(config: EntryPointConfig) -> Self {
        Self::with_state(config, ChainState::new())
    }

    pub fn with_state(config: EntryPointConfig, state: ChainState) -> Self {
        Self {
            config,
            factory: AccountFactory::default(),
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn address(&self) -> Address {
        self.config.address
    }

    pub fn config(&self) -> &EntryPointConfig {
        &self.config
    }

    pub fn factory(&self) -> &AccountFactory {
        &self.factory
    }

    /// Run a query against the current state
    pub async fn read<R>(&self, f: impl FnOnce(&ChainState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Apply a privileged change (deployments, vault controls) as one staged
    /// unit
    pub async fn admin<R>(&self, f: impl FnOnce(&mut ChainState) -> Result<R>) -> Result<R> {
        let mut state = self.state.write().await;
        state.stage(f)
    }

    pub async fn get_nonce(&self, account: &Address) -> u64 {
        self.state.read().await.nonce_of(account)
    }

    pub async fn balance_of(&self, token: &Address, holder: &Address) -> Assets {
        self.state.read().await.balance_of(token, holder)
    }

    pub async fn deposit_of(&self, holder: &Address) -> Assets {
        self.state.read().await.deposit_of(holder)
    }

    pub async fn set_timestamp(&self, timestamp: u64) {
        self.state.write().await.set_timestamp(timestamp);
    }

    /// Routing snapshot of `account` for `token`
    pub async fn routing_status(&self, account: &Address, token: &Address) -> Result<RoutingStatus> {
        let state = self.state.read().await;
        let view = AccountView::new(&state, *account);
        state.account(account)?.routing().status(&view, token)
    }

    // ========================================================================
    // Accounts, prefunds and sponsors
    // ========================================================================

    pub async fn create_account(&self, owner: &Address, salt: u64) -> Result<Address> {
        let factory = self.factory;
        self.admin(|state| factory.create_account(state, owner, salt)).await
    }

    /// Move `amount` native coin from `from` into the prefund of `to`
    pub async fn deposit_to(&self, from: &Address, to: &Address, amount: Assets) -> Result<Assets> {
        let entry_point = self.config.address;
        let deposit = self
            .admin(|state| {
                state
                    .ledger
                    .transfer(&Address::NATIVE, from, &entry_point, amount)?;
                credit_deposit(state, to, amount)
            })
            .await?;
        info!(from = %from, to = %to, amount, deposit, "deposit added");
        Ok(deposit)
    }

    /// Pay `amount` of `owner`'s prefund out to `to`
    pub async fn withdraw_deposit(&self, owner: &Address, to: &Address, amount: Assets) -> Result<Assets> {
        let entry_point = self.config.address;
        let remaining = self
            .admin(|state| {
                let remaining = debit_deposit(state, owner, amount)?;
                state
                    .ledger
                    .transfer(&Address::NATIVE, &entry_point, to, amount)?;
                Ok(remaining)
            })
            .await?;
        info!(owner = %owner, to = %to, amount, remaining, "deposit withdrawn");
        Ok(remaining)
    }

    pub async fn register_sponsor(&self, sponsor: &Address) -> Result<()> {
        if sponsor.is_zero() {
            return Err(AutoYieldError::ZeroAddress {
                role: "sponsor".to_string(),
            });
        }
        self.state.write().await.sponsors.insert(*sponsor);
        info!(sponsor = %sponsor, "sponsor registered");
        Ok(())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Validate `op` without committing anything
    pub async fn simulate_validation(&self, op: &UserOperation) -> Result<ValidationResult> {
        let state = self.state.read().await;
        OperationValidator::new(&state, &self.config).validate(op)
    }

    /// Validate and execute one operation.
    ///
    /// Validation failures return `Err` and change nothing. Once validated,
    /// the nonce is consumed and the fee charged even if execution reverts;
    /// a revert is reported in the receipt.
    pub async fn handle_op(&self, op: UserOperation) -> Result<OpReceipt> {
        let mut state = self.state.write().await;
        process_operation(&mut state, &self.config, &op, &self.config.beneficiary)
    }

    /// Process `ops` in order, paying every fee to `beneficiary`.
    ///
    /// One operation failing does not stop the batch.
    pub async fn handle_ops(&self, ops: Vec<UserOperation>, beneficiary: &Address) -> Vec<Result<OpReceipt>> {
        let mut state = self.state.write().await;
        ops.iter()
            .map(|op| process_operation(&mut state, &self.config, op, beneficiary))
            .collect()
    }

    /// Rebalance `token` for `account` through an installed executor module.
    ///
    /// Needs no signature: the executor's install is the authorization.
    pub async fn trigger_executor(
        &self,
        executor: &Address,
        account: &Address,
        token: &Address,
    ) -> Result<RoutingOutcome> {
        let result = self
            .admin(|state| state.execute_from_executor(executor, account, token))
            .await;
        match &result {
            Ok(outcome) => {
                info!(executor = %executor, account = %account, token = %token, pulled = outcome.pulled, pushed = outcome.pushed, "executor rebalance")
            }
            Err(e) => {
                warn!(executor = %executor, account = %account, token = %token, error = %e, "executor rebalance reverted")
            }
        }
        result
    }
}

#[async_trait]
impl OperationRelay for EntryPoint {
    async fn submit(&self, op: UserOperation) -> Result<OpReceipt> {
        self.handle_op(op).await
    }

    async fn next_nonce(&self, account: &Address) -> u64 {
        self.get_nonce(account).await
    }

    fn config(&self) -> &EntryPointConfig {
        &self.config
    }
}

fn credit_deposit(state: &mut ChainState, holder: &Address, amount: Assets) -> Result<Assets> {
    let deposit = state.deposits.entry(*holder).or_insert(0);
    *deposit = deposit
        .checked_add(amount)
        .ok_or(AutoYieldError::ArithmeticOverflow)?;
    Ok(*deposit)
}

fn debit_deposit(state: &mut ChainState, holder: &Address, amount: Assets) -> Result<Assets> {
    let available = state.deposit_of(holder);
    if available < amount {
        return Err(AutoYieldError::InsufficientDeposit {
            payer: *holder,
            available,
            required: amount,
        });
    }
    state.deposits.insert(*holder, available - amount);
    Ok(available - amount)
}

fn process_operation(
    state: &mut ChainState,
    config: &EntryPointConfig,
    op: &UserOperation,
    beneficiary: &Address,
) -> Result<OpReceipt> {
    let validation = OperationValidator::new(state, config)
        .validate(op)
        .map_err(|e| {
            warn!(account = %op.sender, nonce = op.nonce, code = e.code(), error = %e, "operation rejected");
            e
        })?;

    let first_event = state.events.len();
    let outcome = state.stage(|s| {
        let next_nonce = op.nonce.checked_add(1).ok_or(AutoYieldError::ArithmeticOverflow)?;
        s.nonces.insert(op.sender, next_nonce);

        debit_deposit(s, &validation.payer, validation.max_cost)?;
        credit_deposit(s, beneficiary, validation.max_cost)?;
        if validation.payer != op.sender {
            s.events.push(Event::SponsorCharged {
                sponsor: validation.payer,
                account: op.sender,
                cost: validation.max_cost,
            });
        }

        let executed = s.stage(|unit| unit.execute_action(&op.sender, &op.action));
        s.events.push(Event::OperationHandled {
            account: op.sender,
            nonce: op.nonce,
            success: executed.is_ok(),
            cost: validation.max_cost,
        });
        Ok(executed.err())
    })?;

    let receipt = OpReceipt {
        op_hash: validation.op_hash_hex(),
        sender: op.sender,
        nonce: op.nonce,
        success: outcome.is_none(),
        revert_reason: outcome.as_ref().map(|e| e.to_string()),
        error_code: outcome.as_ref().map(|e| e.code().to_string()),
        retryable: outcome.as_ref().map(|e| e.is_retryable()).unwrap_or(false),
        cost: validation.max_cost,
        payer: validation.payer,
        events: state.events[first_event..].to_vec(),
    };

    match &outcome {
        None => info!(
            account = %op.sender,
            nonce = op.nonce,
            action = op.action.name(),
            cost = validation.max_cost,
            payer = %validation.payer,
            "operation executed"
        ),
        Some(e) => warn!(
            account = %op.sender,
            nonce = op.nonce,
            action = op.action.name(),
            code = e.code(),
            error = %e,
            "operation reverted"
        ),
    }
    Ok(receipt)
}
