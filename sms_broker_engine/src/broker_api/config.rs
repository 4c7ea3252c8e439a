use std::env;

use chrono::Duration;
use log::warn;
use smb_common::helpers::parse_u64;

/// Engine tuning knobs, read from the environment with sensible defaults. All durations are given in seconds in
/// the environment.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How long a user must hold a number before they may cancel it.
    pub cancel_hold: Duration,
    /// How long a lease lives before the sweeper retires it.
    pub order_ttl: Duration,
    /// How often the sweeper scans for orders near their deadline.
    pub sweep_interval: Duration,
    /// The sweeper cancels an order this long before its deadline.
    pub sweep_buffer: Duration,
    /// The trailing window the abuse detector measures cancellations against.
    pub abuse_window: Duration,
    /// How many recent cancellations inside the window trigger a block.
    pub abuse_threshold: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            cancel_hold: Duration::seconds(120),
            order_ttl: Duration::minutes(20),
            sweep_interval: Duration::seconds(60),
            sweep_buffer: Duration::seconds(60),
            abuse_window: Duration::minutes(3),
            abuse_threshold: 10,
        }
    }
}

impl BrokerConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        Self {
            cancel_hold: env_duration("SMB_CANCEL_HOLD_SECS", defaults.cancel_hold),
            order_ttl: env_duration("SMB_ORDER_TTL_SECS", defaults.order_ttl),
            sweep_interval: env_duration("SMB_SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            sweep_buffer: env_duration("SMB_SWEEP_BUFFER_SECS", defaults.sweep_buffer),
            abuse_window: env_duration("SMB_ABUSE_WINDOW_SECS", defaults.abuse_window),
            abuse_threshold: parse_u64(env::var("SMB_ABUSE_THRESHOLD").ok(), defaults.abuse_threshold as u64)
                as usize,
        }
    }
}

fn env_duration(var: &str, default: Duration) -> Duration {
    let value = env::var(var).ok();
    if let Some(v) = &value {
        if v.trim().parse::<u64>().is_err() {
            warn!("{var} is set to {v}, which is not a number of seconds. Using the default.");
        }
    }
    let secs = parse_u64(value, default.num_seconds() as u64);
    Duration::seconds(secs as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.cancel_hold, Duration::seconds(120));
        assert_eq!(config.order_ttl, Duration::minutes(20));
        assert_eq!(config.abuse_window, Duration::minutes(3));
        assert_eq!(config.abuse_threshold, 10);
    }
}
