mod helpers;

use chrono::{Duration, Utc};
use helpers::{alice, quick_config, setup_with, SERVER};
use sms_broker_engine::{
    test_utils::{mock_provider::MockProvider, seeds},
    BrokerDatabase, BrokerError,
};
use smb_common::UserId;

async fn cancel_one(rig: &helpers::TestRig, user: &UserId) -> i64 {
    let lease = rig.api.acquire_number(user, "tg", SERVER).await.unwrap();
    rig.api.cancel_order(user, lease.order_id).await.unwrap();
    lease.order_id
}

#[tokio::test]
async fn rapid_cancellations_block_the_user() {
    // threshold 3 inside a 3 minute window
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    for _ in 0..2 {
        cancel_one(&rig, &alice()).await;
        let user = rig.accounts.user(&alice()).await.unwrap();
        assert!(!user.blocked);
    }
    cancel_one(&rig, &alice()).await;
    let user = rig.accounts.user(&alice()).await.unwrap();
    assert!(user.blocked);
    assert_eq!(user.blocked_reason.as_deref(), Some("number cancelled repeatedly"));

    // a blocked user cannot lease numbers, but keeps the refunds already granted
    let err = rig.api.acquire_number(&alice(), "tg", SERVER).await.unwrap_err();
    assert!(matches!(err, BrokerError::Blocked));
}

#[tokio::test]
async fn slow_cancellations_do_not_block() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    // two historical cancellations, well outside the window
    for _ in 0..2 {
        let id = cancel_one(&rig, &alice()).await;
        let long_ago = Utc::now() - Duration::minutes(10);
        seeds::backdate_order(rig.db.pool(), id, long_ago - Duration::minutes(5), long_ago).await;
    }
    cancel_one(&rig, &alice()).await;
    let user = rig.accounts.user(&alice()).await.unwrap();
    assert!(!user.blocked);
}

// The `updated_at` column is TEXT, so this only holds if every write uses one timestamp format. A backdated row
// and a fresh one must still come back newest-first.
#[tokio::test]
async fn cancellation_history_is_sorted_by_recency() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    let old_id = cancel_one(&rig, &alice()).await;
    let long_ago = Utc::now() - Duration::minutes(10);
    seeds::backdate_order(rig.db.pool(), old_id, long_ago - Duration::minutes(5), long_ago).await;
    let fresh_id = cancel_one(&rig, &alice()).await;

    let recent = rig.db.recent_cancellations(&alice(), 10).await.unwrap();
    let ids = recent.iter().map(|o| o.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![fresh_id, old_id]);
    assert!(recent[0].updated_at > recent[1].updated_at);
}

#[tokio::test]
async fn disarmed_rule_never_blocks() {
    let rig = setup_with(quick_config(), MockProvider::new()).await;
    seeds::disarm_abuse_rule(&rig.db, "number_cancel").await;
    for _ in 0..5 {
        cancel_one(&rig, &alice()).await;
    }
    let user = rig.accounts.user(&alice()).await.unwrap();
    assert!(!user.blocked);
}
