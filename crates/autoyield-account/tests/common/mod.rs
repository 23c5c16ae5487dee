//! Shared world for the account integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;

use autoyield_account::{sign_operation, EntryPoint, EntryPointConfig, Merchant, OpReceipt};
use autoyield_crypto::KeyPair;
use autoyield_types::{AccountAction, Address, Assets, Shares, UserOperation};
use autoyield_vault::{InMemoryVault, VaultOracle};

pub const GAS_FUNDS: Assets = 1_000_000_000;
pub const PREFUND: Assets = 100_000_000;
pub const CHECKOUT_PRICE: Assets = 600;

/// One token, one vault + adapter, one merchant and one owned account
pub struct World {
    pub entry_point: EntryPoint,
    pub owner: KeyPair,
    pub account: Address,
    pub usdc: Address,
    pub vault: Address,
    pub adapter: Address,
    pub merchant: Address,
}

/// Everything a reverted unit must leave untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub account_holdings: BTreeMap<Address, Assets>,
    pub merchant_usdc: Assets,
    pub shares: Shares,
    pub adapter_shares: Shares,
    pub vault_assets: Assets,
}

impl World {
    pub async fn new() -> Self {
        let entry_point = EntryPoint::new(EntryPointConfig::default());
        let owner = KeyPair::for_label("owner").unwrap();
        let usdc = Address::from_label("usdc");
        let vault = Address::from_label("vault.usdc");
        let adapter = Address::from_label("adapter.usdc");
        let merchant = Address::from_label("merchant");

        entry_point
            .admin(|s| {
                s.register_token(usdc)?;
                s.deploy_vault(InMemoryVault::new(vault, usdc)?)?;
                s.deploy_adapter(adapter, &vault)?;
                s.deploy_target(Box::new(Merchant::new(merchant, usdc, CHECKOUT_PRICE)))?;
                Ok(())
            })
            .await
            .unwrap();

        let account = entry_point.create_account(&owner.address(), 0).await.unwrap();
        entry_point
            .admin(|s| s.mint(&Address::NATIVE, &account, GAS_FUNDS))
            .await
            .unwrap();
        entry_point.deposit_to(&account, &account, PREFUND).await.unwrap();

        Self {
            entry_point,
            owner,
            account,
            usdc,
            vault,
            adapter,
            merchant,
        }
    }

    /// Checking `checking`, yield position `yielded`, threshold `threshold`
    pub async fn seeded(checking: Assets, yielded: Assets, threshold: Assets) -> Self {
        let world = Self::new().await;
        world.mint_usdc(checking + yielded).await;
        world
            .submit_ok(AccountAction::SetActiveAdapter {
                token: world.usdc,
                adapter: world.adapter,
            })
            .await;
        world.set_threshold(checking).await;
        if yielded > 0 {
            world.submit_ok(AccountAction::Rebalance { token: world.usdc }).await;
        }
        world.set_threshold(threshold).await;
        assert_eq!(world.checking().await, checking);
        world
    }

    pub async fn mint_usdc(&self, amount: Assets) {
        let (usdc, account) = (self.usdc, self.account);
        self.entry_point
            .admin(|s| s.mint(&usdc, &account, amount))
            .await
            .unwrap();
    }

    pub async fn set_threshold(&self, threshold: Assets) {
        self.submit_ok(AccountAction::SetCheckingThreshold {
            token: self.usdc,
            threshold,
        })
        .await;
    }

    /// Owner-signed operation at the current nonce
    pub async fn op(&self, action: AccountAction) -> UserOperation {
        let nonce = self.entry_point.get_nonce(&self.account).await;
        let mut op = UserOperation::new(self.account, nonce, action);
        sign_operation(&mut op, &self.owner, self.entry_point.config()).unwrap();
        op
    }

    pub async fn submit(&self, action: AccountAction) -> OpReceipt {
        let op = self.op(action).await;
        self.entry_point.handle_op(op).await.unwrap()
    }

    pub async fn submit_ok(&self, action: AccountAction) -> OpReceipt {
        let receipt = self.submit(action).await;
        assert!(receipt.success, "reverted: {:?}", receipt.revert_reason);
        receipt
    }

    pub async fn checking(&self) -> Assets {
        self.entry_point.balance_of(&self.usdc, &self.account).await
    }

    pub async fn yield_value(&self) -> Assets {
        let (adapter, account) = (self.adapter, self.account);
        self.entry_point
            .read(|s| s.position_value(&adapter, &account))
            .await
            .unwrap()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let world = (self.account, self.usdc, self.vault, self.adapter, self.merchant);
        self.entry_point
            .read(|s| {
                let (account, usdc, vault, adapter, merchant) = world;
                let adapter = s.adapter(&adapter).unwrap();
                Snapshot {
                    account_holdings: s.ledger().holdings(&account),
                    merchant_usdc: s.balance_of(&usdc, &merchant),
                    shares: adapter.shares_of(&account),
                    adapter_shares: adapter.total_shares_held(),
                    vault_assets: s.vault(&vault).unwrap().total_assets(s.ledger()),
                }
            })
            .await
    }

    /// Share ledger and token supply both balance
    pub async fn assert_conserved(&self) {
        let (usdc, adapter, vault) = (self.usdc, self.adapter, self.vault);
        self.entry_point
            .read(|s| {
                let adapter = s.adapter(&adapter).unwrap();
                assert_eq!(adapter.ledger_sum(), adapter.total_shares_held());
                assert_eq!(
                    s.vault(&vault).unwrap().balance_of(&adapter.address()),
                    adapter.total_shares_held()
                );
                assert_eq!(s.ledger().sum_of_balances(&usdc), s.ledger().total_supply(&usdc));
            })
            .await;
    }
}
