mod helpers;

use helpers::{alice, bob, quick_config, setup, setup_with, SERVER};
use sms_broker_engine::{test_utils::mock_provider::MockProvider, BrokerError};
use smb_common::Money;

#[tokio::test]
async fn registration_is_idempotent() {
    let rig = setup().await;
    let user = rig.accounts.register_user(&bob(), Money::from_whole(50)).await.unwrap();
    assert_eq!(user.balance, Money::from_whole(50));

    // re-registering must not reset the wallet
    rig.api.confirm_top_up(&bob(), "tx-1", Money::from_whole(10)).await.unwrap();
    let user = rig.accounts.register_user(&bob(), Money::from_whole(999)).await.unwrap();
    assert_eq!(user.balance, Money::from_whole(60));
    assert_eq!(user.starting_balance, Money::from_whole(50));
}

#[tokio::test]
async fn top_up_is_idempotent_on_txid() {
    let rig = setup().await;
    let result = rig.api.confirm_top_up(&alice(), "pay-abc", Money::from_whole(25)).await.unwrap();
    assert!(result.credited);
    assert_eq!(result.balance, Money::from_whole(525));

    // a replayed confirmation moves no money
    let result = rig.api.confirm_top_up(&alice(), "pay-abc", Money::from_whole(25)).await.unwrap();
    assert!(!result.credited);
    assert_eq!(result.balance, Money::from_whole(525));
}

#[tokio::test]
async fn ledger_reconciles_after_a_full_lifecycle() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    rig.api.confirm_top_up(&alice(), "pay-1", Money::from_whole(40)).await.unwrap();

    // one consumed order and one cancelled one
    let kept = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();
    rig.mock.script_poll(Ok(Some("123456".to_string())));
    rig.api.poll_otp(&alice(), kept.order_id).await.unwrap();
    let dropped = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();
    rig.api.cancel_order(&alice(), dropped.order_id).await.unwrap();

    let summary = rig.accounts.verify_ledger(&alice()).await.unwrap();
    assert_eq!(summary.starting_balance, Money::from_whole(500));
    assert_eq!(summary.top_up_total, Money::from_whole(40));
    // debit 100 + debit 100 + refund 100
    assert_eq!(summary.ledger_total, Money::from_whole(-100));
    assert_eq!(summary.balance, Money::from_whole(440));
}

#[tokio::test]
async fn tampered_balance_is_detected() {
    let rig = setup().await;
    rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    sqlx::query("UPDATE users SET balance = balance + 1 WHERE user_id = 'alice'")
        .execute(rig.db.pool())
        .await
        .unwrap();
    let err = rig.accounts.verify_ledger(&alice()).await.unwrap_err();
    assert!(matches!(err, BrokerError::LedgerMismatch(_)));
}
