mod helpers;

use helpers::{alice, bob, quick_config, setup, setup_with, SERVER};
use sms_broker_engine::{
    db_types::OrderStatusType,
    test_utils::{mock_provider::MockProvider, seeds},
    BrokerError,
};
use smb_common::Money;

#[tokio::test]
async fn acquire_debits_the_resolved_price() {
    let rig = setup().await;
    // base 100, server +2, service -1, user +0.50 => 101.50
    seeds::seed_server_discount(&rig.db, SERVER, Money::from_cents(200)).await;
    seeds::seed_service_discount(&rig.db, "tg", SERVER, Money::from_cents(-100)).await;
    seeds::seed_user_discount(&rig.db, &alice(), "tg", SERVER, Money::from_cents(50)).await;

    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.expect("Acquire failed");
    assert_eq!(lease.price, Money::from_cents(10_150));
    assert_eq!(lease.price.to_string(), "101.50");
    let balance = rig.accounts.balance(&alice()).await.unwrap();
    assert_eq!(balance, Money::from_whole(500) - Money::from_cents(10_150));
    // one Debit entry for exactly the resolved price
    let ledger = rig.accounts.ledger(&alice()).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].amount, -Money::from_cents(10_150));
}

#[tokio::test]
async fn vendor_failure_leaves_no_trace() {
    let rig = setup().await;
    rig.mock.script_acquire(Err(provider_tools::ProviderApiError::NoStock));

    let err = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap_err();
    assert!(matches!(err, BrokerError::NoStock));
    assert_eq!(rig.accounts.balance(&alice()).await.unwrap(), Money::from_whole(500));
    assert!(rig.accounts.order_history(&alice()).await.unwrap().is_empty());
    assert!(rig.accounts.ledger(&alice()).await.unwrap().is_empty());
}

#[tokio::test]
async fn poll_waits_then_finishes_on_first_otp() {
    let rig = setup().await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    let poll = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert!(poll.is_waiting());

    rig.mock.script_poll(Ok(Some("482913".to_string())));
    let poll = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert_eq!(poll.otp, "482913");

    let orders = rig.accounts.order_history(&alice()).await.unwrap();
    assert_eq!(orders[0].status, OrderStatusType::Finished);
    // a finished order is still polled upstream; with nothing new there, the stored code comes back
    let calls_before = rig.mock.calls().len();
    let replay = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert_eq!(replay.otp, "482913");
    assert_eq!(rig.mock.calls().len(), calls_before + 1);
}

// Some vendors deliver further codes after the first one finished the order. Each new code must reach the
// caller and be stored alongside the earlier ones.
#[tokio::test]
async fn follow_up_codes_reach_a_finished_order() {
    let rig = setup().await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    rig.mock.script_poll(Ok(Some("111111".to_string())));
    let poll = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert_eq!(poll.otp, "111111");

    rig.mock.script_poll(Ok(Some("222222".to_string())));
    let poll = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert_eq!(poll.otp, "222222");

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM otps WHERE order_id = $1")
        .bind(lease.order_id)
        .fetch_one(rig.db.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 2);

    // with the vendor quiet again, the latest stored code is the answer
    let poll = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert_eq!(poll.otp, "222222");
}

#[tokio::test]
async fn duplicate_otp_is_idempotent() {
    let rig = setup().await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    rig.mock.script_poll(Ok(Some("111222".to_string())));
    rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    // the same code arriving again must not duplicate the record or disturb the state
    let stored = rig.db.pool();
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM otps WHERE order_id = $1")
        .bind(lease.order_id)
        .fetch_one(stored)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
    let replay = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap();
    assert_eq!(replay.otp, "111222");
}

// A row with a status outside the state machine must surface as an error. Decoding it as Active would put a
// terminal order back in play, refunds included.
#[tokio::test]
async fn corrupted_status_is_an_error_not_active() {
    let rig = setup().await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();
    sqlx::query("UPDATE orders SET status = 'Limbo' WHERE id = $1")
        .bind(lease.order_id)
        .execute(rig.db.pool())
        .await
        .unwrap();

    let err = rig.api.poll_otp(&alice(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::DatabaseError(_)));
    let err = rig.api.cancel_order(&alice(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::DatabaseError(_)));
}

#[tokio::test]
async fn another_users_order_is_invisible() {
    let rig = setup().await;
    seeds::seed_user(&rig.db, &bob(), Money::from_whole(500)).await;
    let lease = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap();

    let err = rig.api.poll_otp(&bob(), lease.order_id).await.unwrap_err();
    assert!(matches!(err, BrokerError::OrderNotFound(_)));
}

#[tokio::test]
async fn acquire_rejections() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;

    // unknown user
    let err = rig.api.acquire_number(&bob(), "tg", SERVER).await.unwrap_err();
    assert!(matches!(err, BrokerError::UserNotFound(_)));

    // unknown service reads as out of stock
    let err = rig.api.acquire_number(&alice(), "wa", SERVER).await.unwrap_err();
    assert!(matches!(err, BrokerError::NoStock));

    // wallet does not cover the price
    seeds::seed_user(&rig.db, &bob(), Money::from_whole(1)).await;
    let err = rig.api.acquire_number(&bob(), "tg", SERVER).await.unwrap_err();
    assert!(matches!(err, BrokerError::LowBalance));

    // site-wide maintenance trumps everything
    seeds::set_site_maintenance(&rig.db, true).await;
    let err = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap_err();
    assert!(matches!(err, BrokerError::Maintenance));
}
