//! Intake of adapter recommendations
//!
//! Ranking happens elsewhere; this side only turns "use this adapter" into a
//! signed configuration operation, and only when it would change something.

use autoyield_crypto::KeyPair;
use autoyield_types::{AccountAction, Address, AutoYieldError, Result, UserOperation};
use serde::{Deserialize, Serialize};

use crate::{sign_operation, ChainState, EntryPoint, OpReceipt};

/// One ranked suggestion from the recommendation feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub token: Address,
    pub adapter: Address,
    /// Estimated yield in basis points
    #[serde(default)]
    pub apy_bps: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationFeed {
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl RecommendationFeed {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Highest-yield recommendation for `token`
    pub fn best_for(&self, token: &Address) -> Option<&Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.token == *token)
            .max_by_key(|r| r.apy_bps)
    }

    pub fn tokens(&self) -> Vec<Address> {
        let mut tokens: Vec<Address> = self.recommendations.iter().map(|r| r.token).collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }
}

/// The configuration action `recommendation` calls for, if any
pub fn plan_adapter_switch(
    state: &ChainState,
    account: &Address,
    recommendation: &Recommendation,
) -> Result<Option<AccountAction>> {
    if recommendation.adapter.is_zero() {
        return Err(AutoYieldError::ZeroAddress {
            role: "adapter".to_string(),
        });
    }
    let asset = state.adapter(&recommendation.adapter)?.asset();
    if asset != recommendation.token {
        return Err(AutoYieldError::AdapterAssetMismatch {
            adapter: recommendation.adapter,
            expected: recommendation.token,
            actual: asset,
        });
    }

    let current = state
        .account(account)?
        .routing()
        .config(&recommendation.token)
        .active_adapter;
    if current == Some(recommendation.adapter) {
        return Ok(None);
    }
    Ok(Some(AccountAction::SetActiveAdapter {
        token: recommendation.token,
        adapter: recommendation.adapter,
    }))
}

/// Switch `account` to the recommended adapter with an owner-signed
/// operation. Returns `None` when the account already uses it.
pub async fn apply_recommendation(
    entry_point: &EntryPoint,
    account: &Address,
    recommendation: &Recommendation,
    owner: &KeyPair,
) -> Result<Option<OpReceipt>> {
    let action = entry_point
        .read(|state| plan_adapter_switch(state, account, recommendation))
        .await?;
    let Some(action) = action else {
        tracing::debug!(account = %account, token = %recommendation.token, "recommendation already applied");
        return Ok(None);
    };

    let nonce = entry_point.get_nonce(account).await;
    let mut op = UserOperation::new(*account, nonce, action);
    sign_operation(&mut op, owner, entry_point.config())?;
    let receipt = entry_point.handle_op(op).await?;
    tracing::info!(
        account = %account,
        token = %recommendation.token,
        adapter = %recommendation.adapter,
        apy_bps = recommendation.apy_bps,
        success = receipt.success,
        "recommendation applied"
    );
    Ok(Some(receipt))
}
