//! Price resolution.
//!
//! The final unit price is the base price plus three independent discount layers: per-server, per-service and
//! per-user. A missing rule contributes zero; a negative "discount" is a surcharge. Amounts are [`Money`], which
//! carries exactly two decimals, so every term is rounded before it is summed. Deterministic and side-effect-free.
use smb_common::Money;

use crate::traits::DiscountSet;

pub fn resolve_price(base: Money, discounts: &DiscountSet) -> Money {
    let zero = Money::default();
    base +
        discounts.server_discount.unwrap_or(zero) +
        discounts.service_discount.unwrap_or(zero) +
        discounts.user_discount.unwrap_or(zero)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_layers_apply() {
        // base 100, server +2, service -1, user +0.50 => 101.50
        let discounts = DiscountSet {
            server_discount: Some(Money::from_cents(200)),
            service_discount: Some(Money::from_cents(-100)),
            user_discount: Some(Money::from_cents(50)),
        };
        let price = resolve_price(Money::from_whole(100), &discounts);
        assert_eq!(price, Money::from_cents(10_150));
        assert_eq!(price.to_string(), "101.50");
    }

    #[test]
    fn missing_rules_contribute_zero() {
        let price = resolve_price(Money::from_whole(100), &DiscountSet::default());
        assert_eq!(price, Money::from_whole(100));
    }

    #[test]
    fn surcharge_is_a_negative_discount() {
        let discounts = DiscountSet { server_discount: Some(Money::from_cents(-250)), ..Default::default() };
        assert_eq!(resolve_price(Money::from_whole(10), &discounts), Money::from_cents(750));
    }
}
