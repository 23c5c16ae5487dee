//! Demo world the keeper operates on

use autoyield_account::{sign_operation, EntryPoint, OpReceipt, Recommendation, RecommendationFeed};
use autoyield_crypto::KeyPair;
use autoyield_router::RoutingStatus;
use autoyield_types::{AccountAction, Address, Assets, Call, UserOperation};
use autoyield_vault::InMemoryVault;

use crate::config::KeeperConfig;

/// Vault strategies deployed for the demo token, with their advertised APY
const STRATEGIES: [(&str, u32); 2] = [("steady", 420), ("boost", 610)];

/// One token with a vault + adapter per strategy and one account paying a
/// merchant
pub struct DemoWorld {
    pub entry_point: EntryPoint,
    pub token: Address,
    pub owner: KeyPair,
    pub automation: KeyPair,
    pub account: Address,
    pub vaults: Vec<Address>,
    pub adapters: Vec<Address>,
    pub merchant: Address,
}

impl DemoWorld {
    pub async fn seed(config: &KeeperConfig) -> anyhow::Result<Self> {
        let entry_point = EntryPoint::new(config.chain.entry_point_config());
        let settings = &config.world;
        let token = Address::from_label(&settings.token_label);
        let owner = KeyPair::for_label(&settings.owner_seed)?;
        let automation = KeyPair::for_label(&config.scheduler.automation_seed)?;
        let merchant = Address::from_label(&format!("merchant.{}", settings.token_label));

        let pairs: Vec<(Address, Address)> = STRATEGIES
            .iter()
            .map(|(name, _)| {
                (
                    Address::from_label(&format!("vault.{}.{}", settings.token_label, name)),
                    Address::from_label(&format!("adapter.{}.{}", settings.token_label, name)),
                )
            })
            .collect();

        let deployments = pairs.clone();
        entry_point
            .admin(move |s| {
                s.register_token(token)?;
                for (vault, adapter) in &deployments {
                    s.deploy_vault(InMemoryVault::new(*vault, token)?)?;
                    s.deploy_adapter(*adapter, vault)?;
                }
                Ok(())
            })
            .await?;

        let account = entry_point.create_account(&owner.address(), 0).await?;
        let (initial, prefund) = (settings.initial_balance, settings.prefund);
        if prefund == 0 {
            anyhow::bail!("world.prefund must cover operation fees");
        }
        entry_point
            .admin(|s| {
                s.mint(&Address::NATIVE, &account, prefund)?;
                if initial > 0 {
                    s.mint(&token, &account, initial)?;
                }
                Ok(())
            })
            .await?;
        entry_point.deposit_to(&account, &account, prefund).await?;

        let world = Self {
            entry_point,
            token,
            owner,
            automation,
            account,
            vaults: pairs.iter().map(|(v, _)| *v).collect(),
            adapters: pairs.iter().map(|(_, a)| *a).collect(),
            merchant,
        };

        world
            .submit_owner(AccountAction::SetCheckingThreshold {
                token,
                threshold: settings.checking_threshold,
            })
            .await?;
        world
            .submit_owner(AccountAction::SetAutomationKey {
                key: Some(world.automation.address()),
            })
            .await?;

        tracing::info!(
            account = %world.account,
            token = %token,
            owner = %world.owner.address(),
            automation = %world.automation.address(),
            "demo world seeded"
        );
        Ok(world)
    }

    /// Built-in feed ranking the demo strategies
    pub fn default_feed(&self) -> RecommendationFeed {
        RecommendationFeed {
            recommendations: self
                .adapters
                .iter()
                .zip(STRATEGIES.iter())
                .map(|(adapter, (_, apy_bps))| Recommendation {
                    token: self.token,
                    adapter: *adapter,
                    apy_bps: *apy_bps,
                })
                .collect(),
        }
    }

    /// Owner-signed operation at the current nonce
    pub async fn submit_owner(&self, action: AccountAction) -> anyhow::Result<OpReceipt> {
        let nonce = self.entry_point.get_nonce(&self.account).await;
        let mut op = UserOperation::new(self.account, nonce, action);
        sign_operation(&mut op, &self.owner, self.entry_point.config())?;
        Ok(self.entry_point.handle_op(op).await?)
    }

    /// Pay the merchant `amount` through an auto-yield call
    pub async fn spend(&self, amount: Assets) -> anyhow::Result<OpReceipt> {
        self.submit_owner(AccountAction::ExecuteWithAutoYield {
            token: self.token,
            call: Call::token_transfer(self.token, self.merchant, amount),
        })
        .await
    }

    /// Strategy gains on every vault, recalled so they are withdrawable
    pub async fn accrue(&self, amount: Assets) -> anyhow::Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let vaults = self.vaults.clone();
        self.entry_point
            .admin(move |s| {
                for vault in &vaults {
                    s.vault_accrue(vault, amount)?;
                    s.vault_recall(vault, amount)?;
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn status(&self) -> anyhow::Result<RoutingStatus> {
        Ok(self.entry_point.routing_status(&self.account, &self.token).await?)
    }
}
