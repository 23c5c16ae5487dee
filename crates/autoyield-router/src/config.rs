//! Per-token routing configuration

use autoyield_types::{Address, Assets};
use serde::{Deserialize, Serialize};

/// Routing configuration of one (account, token) pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Minimum underlying units kept spendable
    pub checking_threshold: Assets,
    /// Adapter holding the yield position, if any
    pub active_adapter: Option<Address>,
}

/// What a routing pass moved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingOutcome {
    /// Pulled from yield into checking
    pub pulled: Assets,
    /// Pushed from checking into yield
    pub pushed: Assets,
    pub checking_after: Assets,
}

impl RoutingOutcome {
    pub fn moved(&self) -> bool {
        self.pulled > 0 || self.pushed > 0
    }
}

/// Point-in-time view of a token's split
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStatus {
    pub token: Address,
    pub checking: Assets,
    pub yield_value: Assets,
    pub threshold: Assets,
    pub adapter: Option<Address>,
}
