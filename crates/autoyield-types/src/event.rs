//! Events emitted by committed units of work
//!
//! Events live inside the staged state: a reverted unit emits nothing.

use serde::{Deserialize, Serialize};

use crate::{Address, Assets, ModuleType, Shares};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Deposited {
        adapter: Address,
        depositor: Address,
        assets: Assets,
        shares: Shares,
    },
    Withdrawn {
        adapter: Address,
        depositor: Address,
        assets: Assets,
        shares: Shares,
    },
    ModuleInstalled {
        account: Address,
        module_type: ModuleType,
        module: Address,
    },
    ModuleUninstalled {
        account: Address,
        module_type: ModuleType,
        module: Address,
    },
    ThresholdSet {
        account: Address,
        token: Address,
        threshold: Assets,
    },
    AdapterSet {
        account: Address,
        token: Address,
        adapter: Address,
    },
    RoutingCleared {
        account: Address,
        token: Address,
    },
    AutomationKeySet {
        account: Address,
        key: Option<Address>,
    },
    Rebalanced {
        account: Address,
        token: Address,
        pulled: Assets,
        pushed: Assets,
        checking_after: Assets,
    },
    Flushed {
        account: Address,
        token: Address,
        assets: Assets,
    },
    Executed {
        account: Address,
        to: Address,
        value: Assets,
    },
    SponsorCharged {
        sponsor: Address,
        account: Address,
        cost: Assets,
    },
    OperationHandled {
        account: Address,
        nonce: u64,
        success: bool,
        cost: Assets,
    },
}
