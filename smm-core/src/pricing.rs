//! Order price computation.
//!
//! Prices are computed with [`Decimal`] so `59.99 * 1.2` is exactly `71.988`.
//! The calculator is a pure function: it never fails and never enforces
//! quantity bounds (see [`crate::checkout::validate_quantity`]).

use rust_decimal::Decimal;
use smm_sdk::objects::{AppliedCoupon, Service};

const THOUSAND: Decimal = Decimal::ONE_THOUSAND;
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// "Was/now" pair for display and charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceQuote {
    /// Base price before the express fee and discounts.
    pub original_price: Decimal,
    /// Amount charged. Never negative.
    pub final_price: Decimal,
}

impl PriceQuote {
    pub const ZERO: PriceQuote = PriceQuote {
        original_price: Decimal::ZERO,
        final_price: Decimal::ZERO,
    };
}

/// Compute the price of `quantity` units of `service`.
///
/// 1. `unit = price_per_thousand / 1000`, `original = unit * quantity`
/// 2. express orders on eligible services pay `original * (1 + fee / 100)`
/// 3. the coupon discount is subtracted last and the result floored at zero
///
/// A missing quantity prices at zero. Negative fees and discounts are
/// treated as zero.
pub fn compute_price(
    service: &Service,
    quantity: Option<u64>,
    is_express: bool,
    express_fee_percent: Decimal,
    applied_coupon: Option<&AppliedCoupon>,
) -> PriceQuote {
    let Some(quantity) = quantity else {
        return PriceQuote::ZERO;
    };

    let unit_price = service.price_per_thousand / THOUSAND;
    let original_price = unit_price * Decimal::from(quantity);

    let price_after_express = if is_express && service.is_express_eligible {
        let fee = express_fee_percent.max(Decimal::ZERO);
        original_price * (Decimal::ONE + fee / HUNDRED)
    } else {
        original_price
    };

    let discount = applied_coupon
        .map(|c| c.discount_amount.max(Decimal::ZERO))
        .unwrap_or_default();
    let final_price = (price_after_express - discount).max(Decimal::ZERO);

    PriceQuote {
        original_price,
        final_price,
    }
}

/// Parse a raw quantity input. Anything that is not a positive integer is
/// treated as absent.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|q| *q > 0)
}
