//! Integer share math

use autoyield_types::{AutoYieldError, Result};

/// Rounding direction for a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// `value * numerator / denominator` with explicit rounding
pub fn mul_div(value: u128, numerator: u128, denominator: u128, rounding: Rounding) -> Result<u128> {
    if denominator == 0 {
        return Err(AutoYieldError::InvariantViolated {
            reason: "division by zero in share math".to_string(),
        });
    }
    let product = value
        .checked_mul(numerator)
        .ok_or(AutoYieldError::ArithmeticOverflow)?;
    let quotient = product / denominator;
    match rounding {
        Rounding::Down => Ok(quotient),
        Rounding::Up if product % denominator != 0 => Ok(quotient + 1),
        Rounding::Up => Ok(quotient),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(mul_div(10, 1, 3, Rounding::Down).unwrap(), 3);
        assert_eq!(mul_div(10, 1, 3, Rounding::Up).unwrap(), 4);
        assert_eq!(mul_div(9, 1, 3, Rounding::Up).unwrap(), 3);
    }

    #[test]
    fn test_overflow_and_zero_denominator() {
        assert_eq!(
            mul_div(u128::MAX, 2, 1, Rounding::Down),
            Err(AutoYieldError::ArithmeticOverflow)
        );
        assert!(mul_div(1, 1, 0, Rounding::Down).is_err());
    }
}
