//! Amounts are stored as NUMERIC with two decimal places. Anything finer is
//! rejected instead of letting the database round it.

use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

pub const MAX_SCALE: u32 = 2;

/// Trailing zeros are ignored, so `12.500` is accepted as `12.50`.
pub fn ensure_cents(field: &str, value: Decimal) -> AppResult<()> {
    if value.normalize().scale() > MAX_SCALE {
        return Err(AppError::BadRequest(format!(
            "{} allows at most {} decimal places",
            field, MAX_SCALE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_two_places_pass() {
        assert!(ensure_cents("Amount", dec!(33.33)).is_ok());
        assert!(ensure_cents("Amount", dec!(100)).is_ok());
        assert!(ensure_cents("Amount", dec!(-0.01)).is_ok());
        assert!(ensure_cents("Amount", dec!(12.500)).is_ok());
    }

    #[test]
    fn test_sub_cent_values_rejected() {
        assert!(matches!(ensure_cents("Amount", dec!(33.333)), Err(AppError::BadRequest(_))));
        assert!(ensure_cents("Amount", dec!(0.001)).is_err());
    }
}
