//! Scheduled rebalancing
//!
//! Each tick submits one automation-signed rebalance per watched
//! (account, token). Ticks may repeat or overlap a previous one; a rebalance
//! that has nothing to move is a harmless no-op.

use autoyield_account::{sign_operation, OperationRelay};
use autoyield_crypto::KeyPair;
use autoyield_types::{AccountAction, Address, Event, UserOperation, ValidationMode};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// A pair the keeper keeps balanced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Watch {
    pub account: Address,
    pub token: Address,
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub submitted: usize,
    pub moved: usize,
    /// Reverted or rejected but may succeed on a later tick
    pub deferred: usize,
    /// Rejected for good; needs an operator
    pub failed: usize,
}

pub struct Keeper<R> {
    relay: R,
    key: KeyPair,
    watches: Vec<Watch>,
    ticks: u64,
}

impl<R: OperationRelay> Keeper<R> {
    pub fn new(relay: R, key: KeyPair) -> Self {
        Self {
            relay,
            key,
            watches: Vec::new(),
            ticks: 0,
        }
    }

    pub fn watch(&mut self, account: Address, token: Address) {
        let watch = Watch { account, token };
        if !self.watches.contains(&watch) {
            self.watches.push(watch);
        }
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    /// Submit a rebalance for every watched pair
    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..Default::default()
        };

        for watch in self.watches.clone() {
            let nonce = self.relay.next_nonce(&watch.account).await;
            let mut op = UserOperation::new(
                watch.account,
                nonce,
                AccountAction::Rebalance { token: watch.token },
            )
            .with_mode(ValidationMode::Automation);
            if let Err(e) = sign_operation(&mut op, &self.key, self.relay.config()) {
                error!(account = %watch.account, error = %e, "signing failed");
                report.failed += 1;
                continue;
            }

            report.submitted += 1;
            match self.relay.submit(op).await {
                Ok(receipt) if receipt.success => {
                    let moved = receipt
                        .events
                        .iter()
                        .any(|e| matches!(e, Event::Rebalanced { .. }));
                    if moved {
                        report.moved += 1;
                    } else {
                        debug!(account = %watch.account, token = %watch.token, "already balanced");
                    }
                }
                Ok(receipt) if receipt.retryable => {
                    warn!(
                        account = %watch.account,
                        token = %watch.token,
                        reason = receipt.revert_reason.as_deref().unwrap_or_default(),
                        "rebalance reverted, retrying next tick"
                    );
                    report.deferred += 1;
                }
                Ok(receipt) => {
                    error!(
                        account = %watch.account,
                        token = %watch.token,
                        code = receipt.error_code.as_deref().unwrap_or_default(),
                        "rebalance reverted"
                    );
                    report.failed += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!(account = %watch.account, token = %watch.token, code = e.code(), error = %e, "rebalance rejected, retrying next tick");
                    report.deferred += 1;
                }
                Err(e) => {
                    error!(account = %watch.account, token = %watch.token, code = e.code(), error = %e, "rebalance rejected");
                    report.failed += 1;
                }
            }
        }

        info!(
            tick = report.tick,
            submitted = report.submitted,
            moved = report.moved,
            deferred = report.deferred,
            failed = report.failed,
            "keeper tick"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeeperConfig;
    use crate::world::DemoWorld;
    use autoyield_account::apply_recommendation;

    async fn routed_world() -> DemoWorld {
        let world = DemoWorld::seed(&KeeperConfig::default()).await.unwrap();
        let feed = world.default_feed();
        let best = feed.best_for(&world.token).unwrap().clone();
        apply_recommendation(&world.entry_point, &world.account, &best, &world.owner)
            .await
            .unwrap();
        world
    }

    #[tokio::test]
    async fn test_duplicate_ticks_are_harmless() {
        let world = routed_world().await;
        let mut keeper = Keeper::new(world.entry_point.clone(), world.automation.clone());
        keeper.watch(world.account, world.token);
        keeper.watch(world.account, world.token);
        assert_eq!(keeper.watches().len(), 1);

        let first = keeper.tick().await;
        assert_eq!((first.submitted, first.moved), (1, 1));
        let status = world.status().await.unwrap();
        assert_eq!(status.checking, status.threshold);

        let second = keeper.tick().await;
        assert_eq!((second.submitted, second.moved, second.failed), (1, 0, 0));
        assert_eq!(world.status().await.unwrap(), status);
    }

    #[tokio::test]
    async fn test_wrong_key_fails_without_moving_funds() {
        let world = routed_world().await;
        let before = world.status().await.unwrap();
        let mut keeper = Keeper::new(world.entry_point.clone(), KeyPair::for_label("stranger").unwrap());
        keeper.watch(world.account, world.token);

        let report = keeper.tick().await;
        assert_eq!(report.failed, 1);
        assert_eq!(world.status().await.unwrap(), before);
    }
}
