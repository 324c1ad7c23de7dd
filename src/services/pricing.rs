use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Delivery pricing for a given order total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryQuote {
    pub order_total: Decimal,
    pub delivery_cost: Decimal,
    pub grand_total: Decimal,
    /// How much more the customer would need to spend to qualify for free
    /// delivery. Zero once the threshold is reached.
    pub free_delivery_delta: Decimal,
}

/// Normalizes a money value to exactly two decimal places.
///
/// SQLite drops trailing zeros on the round trip, so a stored `20.00` reads
/// back with scale 0 and would serialize as `"20"`. Every monetary value
/// crossing a serialization boundary goes through here first.
pub fn to_money(amount: Decimal) -> Decimal {
    let mut amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(2);
    amount
}

/// Computes delivery pricing from an order total.
///
/// Orders below `free_delivery_threshold` pay `order_total * rate`, rounded
/// to two decimal places; orders at or above the threshold ship free.
pub fn quote(order_total: Decimal, free_delivery_threshold: Decimal, rate: Decimal) -> DeliveryQuote {
    let order_total = to_money(order_total);
    let (delivery_cost, free_delivery_delta) = if order_total < free_delivery_threshold {
        (
            to_money(order_total * rate),
            to_money(free_delivery_threshold - order_total),
        )
    } else {
        (to_money(Decimal::ZERO), to_money(Decimal::ZERO))
    };

    DeliveryQuote {
        order_total,
        delivery_cost,
        grand_total: order_total + delivery_cost,
        free_delivery_delta,
    }
}

/// Converts a major-unit amount to integer minor units (cents), rounding
/// half away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InvalidOperation(format!("amount {} out of range for charging", amount))
        })
}

pub fn from_minor_units(amount_minor: i64) -> Decimal {
    Decimal::new(amount_minor, 2)
}
