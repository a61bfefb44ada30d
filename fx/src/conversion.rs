//! Conversion quantities.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{FxError, FxResult};

/// Check that a quantity can be converted.
pub fn validate_quantity(quantity: Decimal) -> FxResult<Decimal> {
    if quantity.is_sign_negative() && !quantity.is_zero() {
        return Err(FxError::InvalidAmount(format!(
            "quantity must not be negative, got {}",
            quantity
        )));
    }
    Ok(quantity)
}

/// Parse and validate a quantity from user input.
///
/// Accepts plain (`"100.5"`) and scientific (`"1e3"`) notation.
pub fn parse_quantity(raw: &str) -> FxResult<Decimal> {
    let raw = raw.trim();
    let quantity = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| FxError::InvalidAmount(format!("'{}' is not a number", raw)))?;
    validate_quantity(quantity)
}

/// Multiply a validated quantity by a rate without losing precision.
pub fn apply_rate(quantity: Decimal, rate: Decimal) -> FxResult<Decimal> {
    quantity.checked_mul(rate).ok_or_else(|| {
        FxError::InvalidAmount(format!("quantity {} is too large to convert", quantity))
    })
}
