//! Coupons and tax applied on top of the proration subtotal.
//!
//! Both produce unrounded amounts; the engine rounds them to the currency's
//! minor units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ProrationError, Result};

/// Discount rule applied to a quote's subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Coupon {
    /// Fractional discount (`0.25` takes 25% off a positive subtotal).
    Percent {
        /// Discount fraction in `[0, 1]`.
        value: Decimal,
    },
    /// Fixed amount off, in the quote currency, capped at the subtotal.
    Fixed {
        /// Discount amount, non-negative.
        value: Decimal,
    },
}

impl Coupon {
    /// Creates a percentage coupon from a fraction in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidCoupon`] if the fraction is out of range.
    pub fn percent(value: Decimal) -> Result<Self> {
        let coupon = Self::Percent { value };
        coupon.validate()?;
        Ok(coupon)
    }

    /// Creates a fixed-amount coupon.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidCoupon`] if the amount is negative.
    pub fn fixed(value: Decimal) -> Result<Self> {
        let coupon = Self::Fixed { value };
        coupon.validate()?;
        Ok(coupon)
    }

    /// Checks the coupon value range.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidCoupon`] for a negative value, or a percent value above 1.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Percent { value } if value < Decimal::ZERO || value > Decimal::ONE => {
                Err(ProrationError::InvalidCoupon(format!(
                    "percent coupon value {value} must be between 0 and 1"
                )))
            }
            Self::Fixed { value } if value < Decimal::ZERO => Err(ProrationError::InvalidCoupon(
                format!("fixed coupon value {value} cannot be negative"),
            )),
            _ => Ok(()),
        }
    }

    /// Returns the unrounded discount for `subtotal`.
    ///
    /// A credit-only or zero subtotal is never discounted, and the discount
    /// never exceeds a positive subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::ArithmeticOverflow`] if the multiplication overflows.
    ///
    /// # Examples
    ///
    /// ```
    /// use proration_engine::discount::Coupon;
    /// use rust_decimal::Decimal;
    ///
    /// let coupon = Coupon::fixed(Decimal::from(20)).unwrap();
    /// assert_eq!(coupon.discount_for(Decimal::from(15)).unwrap(), Decimal::from(15));
    /// assert_eq!(coupon.discount_for(Decimal::from(-15)).unwrap(), Decimal::ZERO);
    /// ```
    pub fn discount_for(&self, subtotal: Decimal) -> Result<Decimal> {
        if subtotal <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        match *self {
            Self::Percent { value } => subtotal.checked_mul(value).ok_or_else(|| {
                ProrationError::ArithmeticOverflow("overflow in coupon calculation".into())
            }),
            Self::Fixed { value } => Ok(value.min(subtotal)),
        }
    }
}

/// Tax applied after the coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    /// Tax rate as a fraction in `[0, 1]` (`0.08` for 8%).
    pub rate: Decimal,
}

impl Tax {
    /// Creates a tax with the given rate.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidTax`] if the rate is outside `[0, 1]`.
    pub fn new(rate: Decimal) -> Result<Self> {
        let tax = Self { rate };
        tax.validate()?;
        Ok(tax)
    }

    /// Checks the rate range.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::InvalidTax`] if the rate is outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.rate < Decimal::ZERO || self.rate > Decimal::ONE {
            return Err(ProrationError::InvalidTax(format!(
                "tax rate {} must be between 0 and 1",
                self.rate
            )));
        }
        Ok(())
    }

    /// Returns the unrounded tax on `taxable`. Negative bases are not taxed.
    ///
    /// # Errors
    ///
    /// Returns [`ProrationError::ArithmeticOverflow`] if the multiplication overflows.
    pub fn tax_for(&self, taxable: Decimal) -> Result<Decimal> {
        taxable
            .max(Decimal::ZERO)
            .checked_mul(self.rate)
            .ok_or_else(|| ProrationError::ArithmeticOverflow("overflow in tax calculation".into()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_percent_coupon_positive_subtotal() {
        let coupon = Coupon::percent(dec!(0.25)).unwrap();
        assert_eq!(coupon.discount_for(dec!(40.00)).unwrap(), dec!(10.00));
    }

    #[test]
    fn test_percent_coupon_skips_credit() {
        let coupon = Coupon::percent(dec!(0.5)).unwrap();
        assert_eq!(coupon.discount_for(dec!(-15.00)).unwrap(), Decimal::ZERO);
        assert_eq!(coupon.discount_for(Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_fixed_coupon_capped_at_subtotal() {
        let coupon = Coupon::fixed(dec!(5.00)).unwrap();
        assert_eq!(coupon.discount_for(dec!(15.00)).unwrap(), dec!(5.00));
        assert_eq!(coupon.discount_for(dec!(3.00)).unwrap(), dec!(3.00));
    }

    #[test]
    fn test_coupon_validation() {
        assert!(matches!(Coupon::percent(dec!(1.5)), Err(ProrationError::InvalidCoupon(_))));
        assert!(matches!(Coupon::percent(dec!(-0.1)), Err(ProrationError::InvalidCoupon(_))));
        assert!(matches!(Coupon::fixed(dec!(-1)), Err(ProrationError::InvalidCoupon(_))));
        assert!(Coupon::percent(Decimal::ONE).is_ok());
        assert!(Coupon::fixed(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_coupon_serde_tagged() {
        let coupon: Coupon = serde_json::from_str(r#"{"type":"percent","value":"0.1"}"#).unwrap();
        assert_eq!(coupon, Coupon::Percent { value: dec!(0.1) });

        let json = serde_json::to_string(&Coupon::Fixed { value: dec!(5) }).unwrap();
        assert_eq!(json, r#"{"type":"fixed","value":"5"}"#);
    }

    #[test]
    fn test_tax_applies_to_positive_base_only() {
        let tax = Tax::new(dec!(0.08)).unwrap();
        assert_eq!(tax.tax_for(dec!(100)).unwrap(), dec!(8.00));
        assert_eq!(tax.tax_for(dec!(-100)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_tax_validation() {
        assert!(matches!(Tax::new(dec!(1.01)), Err(ProrationError::InvalidTax(_))));
        assert!(matches!(Tax::new(dec!(-0.01)), Err(ProrationError::InvalidTax(_))));
    }
}
