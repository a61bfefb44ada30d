//! Fixed-scale rounding for derived rates.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places carried by every derived rate.
pub const RATE_SCALE: u32 = 6;

/// Round a derived rate to [`RATE_SCALE`] places, half-up, keeping trailing zeros.
///
/// `0.92` becomes `0.920000`, so a converted amount keeps the same scale as
/// the rate it was multiplied by.
pub fn round_rate(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(RATE_SCALE);
    rounded
}
