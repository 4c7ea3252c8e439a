//! The expiry sweeper.
//!
//! A background task that periodically runs one sweep pass over orders approaching their deadline. Each pass is
//! idempotent, so a missed or doubled tick converges on the next one. The interval comes from
//! [`BrokerConfig::sweep_interval`](crate::BrokerConfig).
use log::*;
use tokio::task::JoinHandle;

use crate::{broker_api::order_flow_api::OrderFlowApi, traits::BrokerDatabase};

/// Spawns the sweeper loop. Abort the returned handle to stop it.
pub fn start_sweeper<B: BrokerDatabase>(api: OrderFlowApi<B>) -> JoinHandle<()> {
    let period = api.config().sweep_interval.to_std().unwrap_or(std::time::Duration::from_secs(60));
    tokio::spawn(async move {
        info!("🕰️ Expiry sweeper started. Sweeping every {}s", period.as_secs());
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match api.sweep_once().await {
                Ok(report) => {
                    if report.examined > 0 {
                        debug!(
                            "🕰️ Sweep pass done. {} examined, {} retired, {} deferred, {} failed",
                            report.examined, report.retired, report.deferred, report.failed
                        );
                    }
                },
                Err(e) => warn!("🕰️ Sweep pass failed: {e}. Will try again next tick"),
            }
        }
    })
}
