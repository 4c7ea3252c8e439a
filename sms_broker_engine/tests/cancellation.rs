mod helpers;

use chrono::{Duration, Utc};
use helpers::{alice, quick_config, setup_with, SERVER};
use provider_tools::{CancelOutcome, ProviderApiError};
use sms_broker_engine::{
    db_types::OrderStatusType,
    test_utils::{mock_provider::MockProvider, seeds},
    BrokerConfig,
    BrokerError,
};
use smb_common::Money;

#[tokio::test]
async fn cancel_within_the_hold_period_is_refused() {
    let config = BrokerConfig { cancel_hold: Duration::seconds(120), ..quick_config() };
    let rig = setup_with(config, MockProvider::new()).await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    // the order is 30 seconds old, well inside the two-minute hold
    let now = Utc::now();
    seeds::backdate_order(rig.db.pool(), lease.order_id, now - Duration::seconds(30), now - Duration::seconds(30))
        .await;
    let err = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::TooEarlyToCancel));

    // the money stays debited and the order stays Active
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(400));
    let orders = rig.accounts.order_history(&alice()).await.unwrap();
    assert_eq!(orders[0].status, OrderStatusType::Active);
}

#[tokio::test]
async fn cancel_after_the_hold_refunds_once() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(400));

    let result = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap();
    assert!(result.refunded);
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(500));

    // a second cancel finds the order already terminal
    let err = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::OrderNotFound(_)));
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(500));

    // exactly one Debit and one Refund in the ledger
    let ledger = rig.accounts.ledger(&alice()).await.unwrap();
    assert_eq!(ledger.len(), 2);
    let total: Money = ledger.iter().map(|e| e.amount).sum();
    assert_eq!(total, Money::default());
}

#[tokio::test]
async fn cancel_with_a_stored_otp_is_refused() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();
    rig.mock.script_poll(Ok(Some("907070".to_string())));
    rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();

    let err = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::OrderNotFound(_) | BrokerError::OtpAlreadyReceived));
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(400));
}

#[tokio::test]
async fn otp_beating_the_cancel_upstream_finishes_the_order() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    // the vendor refuses the cancel because an SMS slipped in; the follow-up poll captures it
    rig.mock.script_cancel(Ok(CancelOutcome::OtpReceived));
    rig.mock.script_poll(Ok(Some("313131".to_string())));
    let err = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::OtpAlreadyReceived));

    // Finished, no refund, and the code is readable
    let orders = rig.accounts.order_history(&alice()).await.unwrap();
    assert_eq!(orders[0].status, OrderStatusType::Finished);
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(400));
    let poll = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert_eq!(poll.otp, "313131");
}

#[tokio::test]
async fn vendor_already_cancelled_still_refunds() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    rig.mock.script_cancel(Err(ProviderApiError::AlreadyCancelled));
    let result = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap();
    assert!(result.refunded);
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(500));
}

#[tokio::test]
async fn upstream_failure_leaves_the_order_active() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    rig.mock.script_cancel(Err(ProviderApiError::UpstreamError("504".to_string())));
    let err = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::UpstreamError(_)));

    // nothing moved; the user can retry
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(400));
    let orders = rig.accounts.order_history(&alice()).await.unwrap();
    assert_eq!(orders[0].status, OrderStatusType::Active);
    let result = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap();
    assert!(result.refunded);
}
