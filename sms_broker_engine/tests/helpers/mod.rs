#![allow(dead_code)]
use std::sync::Arc;

use chrono::Duration;
use provider_tools::ProviderRegistry;
use sms_broker_engine::{
    events::EventProducers,
    test_utils::{
        mock_provider::MockProvider,
        prepare_env::{prepare_test_env, random_db_path},
        seeds,
    },
    AccountApi,
    BrokerConfig,
    OrderFlowApi,
    SqliteDatabase,
};
use smb_common::{Money, ServerId, UserId};

pub const SERVER: ServerId = ServerId(1);

pub struct TestRig {
    pub db: SqliteDatabase,
    pub api: OrderFlowApi<SqliteDatabase>,
    pub accounts: AccountApi<SqliteDatabase>,
    pub mock: MockProvider,
}

/// Fresh database, one mock vendor on server 1, a user `alice` with 500.00 and a `tg` service priced 100.00.
pub async fn setup() -> TestRig {
    setup_with(BrokerConfig::default(), MockProvider::new()).await
}

pub async fn setup_with(config: BrokerConfig, mock: MockProvider) -> TestRig {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seeds::seed_server(&db, SERVER, "5sim", false).await;
    seeds::seed_service(&db, "tg", SERVER, "telegram", Money::from_whole(100)).await;
    seeds::seed_user(&db, &alice(), Money::from_whole(500)).await;
    let mut registry = ProviderRegistry::new();
    registry.register(SERVER, Arc::new(mock.clone()));
    let api = OrderFlowApi::new(db.clone(), registry, config, EventProducers::default());
    let accounts = AccountApi::new(db.clone());
    TestRig { db, api, accounts, mock }
}

/// A config whose hold period and abuse window are short enough to exercise in a test.
pub fn quick_config() -> BrokerConfig {
    BrokerConfig {
        cancel_hold: Duration::zero(),
        order_ttl: Duration::minutes(20),
        sweep_interval: Duration::seconds(1),
        sweep_buffer: Duration::seconds(1),
        abuse_window: Duration::minutes(3),
        abuse_threshold: 3,
    }
}

pub fn alice() -> UserId {
    UserId::from("alice")
}

pub fn bob() -> UserId {
    UserId::from("bob")
}
