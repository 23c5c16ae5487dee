//! Operation validation, sponsorship and fee charging

mod common;

use autoyield_account::{sign_operation, sponsor_operation};
use autoyield_crypto::KeyPair;
use autoyield_types::{
    AccountAction, Address, AutoYieldError, Call, ErrorClass, Event, GasParams, UserOperation,
    ValidationMode, ValidityWindow,
};
use common::{World, PREFUND};

#[tokio::test]
async fn test_consumed_nonce_is_rejected() {
    let world = World::seeded(300, 1_000, 500).await;
    let op = world.op(AccountAction::Rebalance { token: world.usdc }).await;

    world.entry_point.handle_op(op.clone()).await.unwrap();
    let snapshot = world.snapshot().await;
    let nonce = world.entry_point.get_nonce(&world.account).await;

    let replay = world.entry_point.handle_op(op).await;
    assert!(matches!(replay, Err(AutoYieldError::InvalidNonce { .. })));
    assert_eq!(world.entry_point.get_nonce(&world.account).await, nonce);
    assert_eq!(world.snapshot().await, snapshot);
}

#[tokio::test]
async fn test_reverted_operation_still_consumes_nonce() {
    let world = World::new().await;
    let pay = Call::token_transfer(world.usdc, world.merchant, 1);
    let op = world.op(AccountAction::Execute(pay)).await;

    let receipt = world.entry_point.handle_op(op.clone()).await.unwrap();
    assert!(!receipt.success);
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::InvalidNonce { expected: 1, got: 0 })
    ));
}

#[tokio::test]
async fn test_validity_window() {
    let world = World::new().await;
    world.entry_point.set_timestamp(1_000).await;
    let config = world.entry_point.config().clone();
    let action = AccountAction::SetCheckingThreshold {
        token: world.usdc,
        threshold: 5,
    };

    let mut early = UserOperation::new(world.account, 0, action.clone())
        .with_window(ValidityWindow::new(2_000, 0));
    sign_operation(&mut early, &world.owner, &config).unwrap();
    let err = world.entry_point.handle_op(early).await.unwrap_err();
    assert!(matches!(err, AutoYieldError::NotYetValid { valid_after: 2_000, now: 1_000 }));
    assert_eq!(err.class(), ErrorClass::Authorization);

    let mut late = UserOperation::new(world.account, 0, action.clone())
        .with_window(ValidityWindow::new(0, 999));
    sign_operation(&mut late, &world.owner, &config).unwrap();
    assert!(matches!(
        world.entry_point.handle_op(late).await,
        Err(AutoYieldError::Expired { .. })
    ));
    assert_eq!(world.entry_point.get_nonce(&world.account).await, 0);

    let mut timely = UserOperation::new(world.account, 0, action)
        .with_window(ValidityWindow::new(500, 1_000));
    sign_operation(&mut timely, &world.owner, &config).unwrap();
    assert!(world.entry_point.handle_op(timely).await.unwrap().success);
}

#[tokio::test]
async fn test_tampered_operation_fails_signature() {
    let world = World::new().await;
    let mut op = world
        .op(AccountAction::SetCheckingThreshold {
            token: world.usdc,
            threshold: 5,
        })
        .await;
    op.action = AccountAction::SetCheckingThreshold {
        token: world.usdc,
        threshold: 0,
    };
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::InvalidSignature)
    ));
}

#[tokio::test]
async fn test_sponsor_pays_fee() {
    let world = World::new().await;
    let sponsor = KeyPair::for_label("sponsor").unwrap();
    let config = world.entry_point.config().clone();
    world
        .entry_point
        .admin(|s| s.mint(&Address::NATIVE, &sponsor.address(), 10_000_000))
        .await
        .unwrap();
    world
        .entry_point
        .deposit_to(&sponsor.address(), &sponsor.address(), 10_000_000)
        .await
        .unwrap();
    world.entry_point.register_sponsor(&sponsor.address()).await.unwrap();

    let mut op = UserOperation::new(
        world.account,
        0,
        AccountAction::SetCheckingThreshold {
            token: world.usdc,
            threshold: 50,
        },
    );
    sponsor_operation(&mut op, &sponsor, ValidityWindow::unbounded(), &config).unwrap();
    sign_operation(&mut op, &world.owner, &config).unwrap();

    let receipt = world.entry_point.handle_op(op).await.unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.payer, sponsor.address());
    assert_eq!(world.entry_point.deposit_of(&world.account).await, PREFUND);
    assert_eq!(
        world.entry_point.deposit_of(&sponsor.address()).await,
        10_000_000 - receipt.cost
    );
    assert!(receipt.events.iter().any(|e| matches!(
        e,
        Event::SponsorCharged { sponsor: s, .. } if *s == sponsor.address()
    )));
}

#[tokio::test]
async fn test_sponsor_approval_is_bound_to_operation() {
    let world = World::new().await;
    let sponsor = KeyPair::for_label("sponsor").unwrap();
    let config = world.entry_point.config().clone();
    world.entry_point.register_sponsor(&sponsor.address()).await.unwrap();

    let mut approved = UserOperation::new(
        world.account,
        0,
        AccountAction::SetCheckingThreshold {
            token: world.usdc,
            threshold: 50,
        },
    );
    sponsor_operation(&mut approved, &sponsor, ValidityWindow::unbounded(), &config).unwrap();

    // Reuse the approval on a different operation
    let mut other = UserOperation::new(
        world.account,
        0,
        AccountAction::FlushToChecking { token: world.usdc },
    );
    other.sponsor = approved.sponsor.clone();
    sign_operation(&mut other, &world.owner, &config).unwrap();

    assert!(matches!(
        world.entry_point.handle_op(other).await,
        Err(AutoYieldError::SponsorRejected { .. })
    ));
    assert_eq!(world.entry_point.get_nonce(&world.account).await, 0);
}

#[tokio::test]
async fn test_unregistered_sponsor_and_sponsor_window() {
    let world = World::new().await;
    let sponsor = KeyPair::for_label("sponsor").unwrap();
    let config = world.entry_point.config().clone();
    let action = AccountAction::Rebalance { token: world.usdc };

    let mut op = UserOperation::new(world.account, 0, action.clone());
    sponsor_operation(&mut op, &sponsor, ValidityWindow::unbounded(), &config).unwrap();
    sign_operation(&mut op, &world.owner, &config).unwrap();
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::SponsorNotRegistered { .. })
    ));

    // A registered sponsor's window narrows the operation's
    world.entry_point.register_sponsor(&sponsor.address()).await.unwrap();
    world.entry_point.set_timestamp(500).await;
    let mut op = UserOperation::new(world.account, 0, action);
    sponsor_operation(&mut op, &sponsor, ValidityWindow::new(0, 100), &config).unwrap();
    sign_operation(&mut op, &world.owner, &config).unwrap();
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::Expired { valid_until: 100, .. })
    ));
}

#[tokio::test]
async fn test_fee_limits() {
    let world = World::new().await;
    let cap = world.entry_point.config().max_fee_per_gas;

    let greedy = GasParams {
        max_fee_per_gas: cap + 1,
        ..GasParams::default()
    };
    let mut op = UserOperation::new(world.account, 0, AccountAction::Rebalance { token: world.usdc })
        .with_gas(greedy);
    sign_operation(&mut op, &world.owner, world.entry_point.config()).unwrap();
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::GasPriceTooHigh { .. })
    ));

    let expensive = GasParams {
        verification_gas_limit: PREFUND as u64,
        call_gas_limit: 0,
        max_fee_per_gas: 2,
    };
    let mut op = UserOperation::new(world.account, 0, AccountAction::Rebalance { token: world.usdc })
        .with_gas(expensive);
    sign_operation(&mut op, &world.owner, world.entry_point.config()).unwrap();
    let err = world.entry_point.handle_op(op).await.unwrap_err();
    assert!(matches!(err, AutoYieldError::InsufficientDeposit { .. }));
}

#[tokio::test]
async fn test_automation_key_limited_to_rebalance() {
    let world = World::seeded(300, 1_000, 500).await;
    let keeper = KeyPair::for_label("keeper").unwrap();
    let config = world.entry_point.config().clone();
    world
        .submit_ok(AccountAction::SetAutomationKey {
            key: Some(keeper.address()),
        })
        .await;

    let nonce = world.entry_point.get_nonce(&world.account).await;
    let drain = Call::token_transfer(world.usdc, keeper.address(), 300);
    let mut op = UserOperation::new(world.account, nonce, AccountAction::Execute(drain))
        .with_mode(ValidationMode::Automation);
    sign_operation(&mut op, &keeper, &config).unwrap();
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::AutomationScopeViolation { .. })
    ));

    let mut op = UserOperation::new(world.account, nonce, AccountAction::Rebalance { token: world.usdc })
        .with_mode(ValidationMode::Automation);
    sign_operation(&mut op, &keeper, &config).unwrap();
    assert!(world.entry_point.handle_op(op).await.unwrap().success);
    assert_eq!(world.checking().await, 500);

    // Revoked key no longer works
    world.submit_ok(AccountAction::SetAutomationKey { key: None }).await;
    let nonce = world.entry_point.get_nonce(&world.account).await;
    let mut op = UserOperation::new(world.account, nonce, AccountAction::Rebalance { token: world.usdc })
        .with_mode(ValidationMode::Automation);
    sign_operation(&mut op, &keeper, &config).unwrap();
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn test_automation_key_cannot_route_unconfigured_token() {
    let world = World::new().await;
    let keeper = KeyPair::for_label("keeper").unwrap();
    world
        .submit_ok(AccountAction::SetAutomationKey {
            key: Some(keeper.address()),
        })
        .await;

    let nonce = world.entry_point.get_nonce(&world.account).await;
    let mut op = UserOperation::new(world.account, nonce, AccountAction::Rebalance { token: world.usdc })
        .with_mode(ValidationMode::Automation);
    sign_operation(&mut op, &keeper, world.entry_point.config()).unwrap();
    assert!(matches!(
        world.entry_point.handle_op(op).await,
        Err(AutoYieldError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn test_simulate_validation_changes_nothing() {
    let world = World::new().await;
    let op = world.op(AccountAction::Rebalance { token: world.usdc }).await;

    let result = world.entry_point.simulate_validation(&op).await.unwrap();
    assert_eq!(result.payer, world.account);
    assert_eq!(result.authorizer, world.entry_point.read(|s| s.account(&world.account).unwrap().root_validator()).await);
    assert_eq!(world.entry_point.get_nonce(&world.account).await, 0);
    assert_eq!(world.entry_point.deposit_of(&world.account).await, PREFUND);
}

#[tokio::test]
async fn test_batch_continues_past_failures() {
    let world = World::seeded(300, 1_000, 500).await;
    let beneficiary = Address::from_label("bundler");
    let config = world.entry_point.config().clone();
    let nonce = world.entry_point.get_nonce(&world.account).await;

    let mut first = UserOperation::new(world.account, nonce, AccountAction::Rebalance { token: world.usdc });
    sign_operation(&mut first, &world.owner, &config).unwrap();
    let mut forged = UserOperation::new(world.account, nonce + 1, AccountAction::FlushToChecking { token: world.usdc });
    sign_operation(&mut forged, &KeyPair::for_label("mallory").unwrap(), &config).unwrap();
    let mut second = UserOperation::new(world.account, nonce + 1, AccountAction::FlushToChecking { token: world.usdc });
    sign_operation(&mut second, &world.owner, &config).unwrap();

    let results = world
        .entry_point
        .handle_ops(vec![first, forged, second], &beneficiary)
        .await;

    assert!(results[0].as_ref().unwrap().success);
    assert!(matches!(results[1], Err(AutoYieldError::InvalidSignature)));
    assert!(results[2].as_ref().unwrap().success);
    assert_eq!(world.checking().await, 1_300);
    let fees: u128 = results.iter().flatten().map(|r| r.cost).sum();
    assert_eq!(world.entry_point.deposit_of(&beneficiary).await, fees);
}
