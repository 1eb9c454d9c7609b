//! Cart and order pricing.
//!
//! Every total shown to a shopper or charged to a card goes through
//! [`PricingPolicy`], so the cart page, checkout summary and persisted order
//! can never disagree about tax or shipping.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::models::{PromoDiscount, PromoKind, ShippingMethod};

/// Round a money amount to cents, halves away from zero.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a dollar amount to Stripe's smallest currency unit.
pub fn to_cents(amount: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    (round2(amount) * Decimal::ONE_HUNDRED).to_i64().unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub free_shipping_threshold: Decimal,
    pub flat_shipping: Decimal,
    pub express_shipping: Decimal,
    pub overnight_shipping: Decimal,
    pub gift_wrap_fee: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            free_shipping_threshold: Decimal::new(50, 0),
            flat_shipping: Decimal::new(15, 0),
            express_shipping: Decimal::new(1499, 2),
            overnight_shipping: Decimal::new(2999, 2),
            gift_wrap_fee: Decimal::new(5, 0),
        }
    }
}

/// A priced line: unit price and quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLine {
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl PriceLine {
    pub fn new(unit_price: Decimal, quantity: u32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub item_count: u32,
    pub free_shipping_threshold: Decimal,
    pub amount_to_free_shipping: Decimal,
}

impl CartTotals {
    pub fn empty(policy: &PricingPolicy) -> Self {
        Self {
            subtotal: Decimal::ZERO,
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping: Decimal::ZERO,
            total: Decimal::ZERO,
            item_count: 0,
            free_shipping_threshold: policy.free_shipping_threshold,
            amount_to_free_shipping: policy.free_shipping_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub gift_wrap_fee: Decimal,
    pub total: Decimal,
}

impl PricingPolicy {
    fn subtotal(lines: &[PriceLine]) -> Decimal {
        lines.iter().map(PriceLine::line_total).sum()
    }

    /// Promo value against `subtotal`, never negative and never more than
    /// the subtotal itself.
    fn discount(subtotal: Decimal, promo: Option<&PromoDiscount>) -> Decimal {
        let raw = match promo {
            Some(promo) => match promo.kind {
                PromoKind::Percentage => subtotal * promo.discount / Decimal::ONE_HUNDRED,
                PromoKind::Fixed => promo.discount,
            },
            None => Decimal::ZERO,
        };
        raw.max(Decimal::ZERO).min(subtotal)
    }

    fn standard_shipping(&self, taxable: Decimal) -> Decimal {
        if taxable >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_shipping
        }
    }

    pub fn cart_totals(&self, lines: &[PriceLine], promo: Option<&PromoDiscount>) -> CartTotals {
        let subtotal = Self::subtotal(lines);
        let discount = Self::discount(subtotal, promo);
        let taxable = subtotal - discount;
        let tax = round2(taxable * self.tax_rate);
        let shipping = self.standard_shipping(taxable);
        let total = round2(subtotal - discount + tax + shipping);

        CartTotals {
            subtotal,
            discount,
            tax,
            shipping,
            total,
            item_count: lines.iter().map(|l| l.quantity).sum(),
            free_shipping_threshold: self.free_shipping_threshold,
            amount_to_free_shipping: (self.free_shipping_threshold - taxable).max(Decimal::ZERO),
        }
    }

    pub fn shipping_for(&self, method: ShippingMethod, taxable: Decimal) -> Decimal {
        match method {
            ShippingMethod::Standard => self.standard_shipping(taxable),
            ShippingMethod::Express => self.express_shipping,
            ShippingMethod::Overnight => self.overnight_shipping,
            ShippingMethod::Pickup => Decimal::ZERO,
        }
    }

    pub fn order_quote(
        &self,
        lines: &[PriceLine],
        promo: Option<&PromoDiscount>,
        method: ShippingMethod,
        gift_wrapping: bool,
    ) -> OrderQuote {
        let subtotal = Self::subtotal(lines);
        let discount = Self::discount(subtotal, promo);
        let taxable = subtotal - discount;
        let tax = round2(taxable * self.tax_rate);
        let shipping = self.shipping_for(method, taxable);
        let gift_wrap_fee = if gift_wrapping {
            self.gift_wrap_fee
        } else {
            Decimal::ZERO
        };

        OrderQuote {
            subtotal,
            discount,
            tax,
            shipping,
            gift_wrap_fee,
            total: round2(subtotal - discount + tax + shipping + gift_wrap_fee),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn fixed(amount: &str) -> PromoDiscount {
        PromoDiscount {
            code: "TEST".to_string(),
            discount: d(amount),
            kind: PromoKind::Fixed,
        }
    }

    fn percent(amount: &str) -> PromoDiscount {
        PromoDiscount {
            code: "TEST".to_string(),
            discount: d(amount),
            kind: PromoKind::Percentage,
        }
    }

    fn sample_lines() -> Vec<PriceLine> {
        vec![PriceLine::new(d("29.99"), 2), PriceLine::new(d("10.00"), 1)]
    }

    #[test]
    fn worked_example_with_fixed_promo() {
        let totals = PricingPolicy::default().cart_totals(&sample_lines(), Some(&fixed("20")));

        assert_eq!(totals.subtotal, d("69.98"));
        assert_eq!(totals.discount, d("20"));
        assert_eq!(totals.tax, d("4.00"));
        assert_eq!(totals.shipping, d("15"));
        assert_eq!(totals.total, d("68.98"));
        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.amount_to_free_shipping, d("0.02"));
    }

    #[test]
    fn subtotal_is_sum_of_lines() {
        let lines = vec![
            PriceLine::new(d("1.10"), 3),
            PriceLine::new(d("0.33"), 7),
            PriceLine::new(d("12.00"), 0),
        ];
        let totals = PricingPolicy::default().cart_totals(&lines, None);
        assert_eq!(totals.subtotal, d("5.61"));
        assert_eq!(totals.discount, Decimal::ZERO);
    }

    #[test]
    fn percentage_promo_discounts_subtotal() {
        let totals = PricingPolicy::default().cart_totals(&sample_lines(), Some(&percent("10")));

        assert_eq!(totals.discount, d("6.998"));
        // 62.982 taxable
        assert_eq!(totals.tax, d("5.04"));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, d("68.02"));
    }

    #[test]
    fn free_shipping_at_threshold() {
        let lines = vec![PriceLine::new(d("50.00"), 1)];
        let totals = PricingPolicy::default().cart_totals(&lines, None);

        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.tax, d("4.00"));
        assert_eq!(totals.total, d("54.00"));
        assert_eq!(totals.amount_to_free_shipping, Decimal::ZERO);
    }

    #[test]
    fn discount_never_exceeds_subtotal() {
        let lines = vec![PriceLine::new(d("10.00"), 1)];
        let totals = PricingPolicy::default().cart_totals(&lines, Some(&fixed("15")));

        assert_eq!(totals.discount, d("10.00"));
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.shipping, d("15"));
        assert_eq!(totals.total, d("15"));
    }

    #[test]
    fn empty_cart_still_charges_shipping() {
        let totals = PricingPolicy::default().cart_totals(&[], None);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.shipping, d("15"));
        assert_eq!(totals.total, d("15"));
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        // 0.0625 * 0.08 = 0.005 exactly
        let lines = vec![PriceLine::new(d("0.0625"), 1)];
        let totals = PricingPolicy::default().cart_totals(&lines, None);
        assert_eq!(totals.tax, d("0.01"));
    }

    #[test]
    fn order_quote_by_shipping_method() {
        let policy = PricingPolicy::default();
        let lines = vec![PriceLine::new(d("20.00"), 1)];

        let standard = policy.order_quote(&lines, None, ShippingMethod::Standard, false);
        assert_eq!(standard.shipping, d("15"));
        assert_eq!(standard.total, d("36.60"));

        let express = policy.order_quote(&lines, None, ShippingMethod::Express, false);
        assert_eq!(express.shipping, d("14.99"));

        let overnight = policy.order_quote(&lines, None, ShippingMethod::Overnight, true);
        assert_eq!(overnight.shipping, d("29.99"));
        assert_eq!(overnight.gift_wrap_fee, d("5"));
        assert_eq!(overnight.total, d("56.59"));

        let pickup = policy.order_quote(&lines, None, ShippingMethod::Pickup, false);
        assert_eq!(pickup.shipping, Decimal::ZERO);
        assert_eq!(pickup.total, d("21.60"));
    }

    #[test]
    fn order_quote_matches_cart_for_standard_shipping() {
        let policy = PricingPolicy::default();
        let promo = percent("20");
        let cart = policy.cart_totals(&sample_lines(), Some(&promo));
        let quote = policy.order_quote(&sample_lines(), Some(&promo), ShippingMethod::Standard, false);

        assert_eq!(cart.subtotal, quote.subtotal);
        assert_eq!(cart.discount, quote.discount);
        assert_eq!(cart.tax, quote.tax);
        assert_eq!(cart.shipping, quote.shipping);
        assert_eq!(cart.total, quote.total);
    }

    #[test]
    fn cents_conversion() {
        assert_eq!(to_cents(d("68.98")), 6898);
        assert_eq!(to_cents(d("0.005")), 1);
        assert_eq!(to_cents(d("15")), 1500);
    }
}
