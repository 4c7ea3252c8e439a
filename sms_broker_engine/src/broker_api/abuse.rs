//! Cancellation-abuse detection.
//!
//! A user who keeps cancelling numbers is probing for free OTPs. The rule: looking at the user's cancellations
//! newest first, if the `threshold`-th most recent one happened within the trailing `window` of now, the user is
//! blocked. Fewer than `threshold` cancellations ever can never trigger a block. An operator can disarm the rule
//! globally. Blocking is additional to the cancel itself, which still completes and refunds normally.
use chrono::{DateTime, Duration, Utc};

use crate::db_types::Order;

pub const CANCEL_ABUSE_RULE: &str = "number_cancel";
pub const BLOCK_REASON: &str = "number cancelled repeatedly";

/// `cancellations` must be the user's Cancelled orders, most recent first. Pure; the caller is responsible for
/// checking the operator override and applying the block.
pub fn exceeds_cancel_threshold(
    cancellations: &[Order],
    threshold: usize,
    window: Duration,
    now: DateTime<Utc>,
) -> bool {
    if threshold == 0 || cancellations.len() < threshold {
        return false;
    }
    let oldest_in_scope = &cancellations[threshold - 1];
    now - oldest_in_scope.updated_at <= window
}

#[cfg(test)]
mod test {
    use smb_common::{Money, ServerId};

    use super::*;
    use crate::db_types::OrderStatusType;

    fn cancelled_order(id: i64, cancelled_at: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: "u1".into(),
            service: "tg".to_string(),
            server: ServerId(1),
            price: Money::from_whole(5),
            number_id: format!("n{id}"),
            phone_number: "9000000000".to_string(),
            status: OrderStatusType::Cancelled,
            created_at: cancelled_at - Duration::minutes(5),
            updated_at: cancelled_at,
            expires_at: cancelled_at + Duration::minutes(15),
        }
    }

    fn history(count: usize, spread: Duration, now: DateTime<Utc>) -> Vec<Order> {
        // Evenly spaced cancellations ending just now, newest first.
        (0..count)
            .map(|i| {
                let age = spread * i as i32 / count.max(1) as i32;
                cancelled_order(i as i64, now - age)
            })
            .collect()
    }

    #[test]
    fn short_history_never_blocks() {
        let now = Utc::now();
        let cancels = history(9, Duration::seconds(10), now);
        assert!(!exceeds_cancel_threshold(&cancels, 10, Duration::minutes(3), now));
    }

    #[test]
    fn tenth_cancel_two_minutes_ago_blocks() {
        let now = Utc::now();
        let mut cancels = history(9, Duration::seconds(30), now);
        cancels.push(cancelled_order(99, now - Duration::minutes(2)));
        assert!(exceeds_cancel_threshold(&cancels, 10, Duration::minutes(3), now));
    }

    #[test]
    fn tenth_cancel_four_minutes_ago_does_not_block() {
        let now = Utc::now();
        let mut cancels = history(9, Duration::seconds(30), now);
        cancels.push(cancelled_order(99, now - Duration::minutes(4)));
        assert!(!exceeds_cancel_threshold(&cancels, 10, Duration::minutes(3), now));
    }
}
