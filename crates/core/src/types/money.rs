//! Decimal money helpers.
//!
//! Amounts are plain [`Decimal`] values in the currency's standard unit
//! (dollars, not cents). The gateway and invoices both want exactly two
//! fractional digits, which [`format_amount`] produces.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is not a decimal number")]
    NotANumber,
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount has more than two decimal places")]
    TooPrecise,
    #[error("amount exceeds {0}")]
    TooLarge(Decimal),
    #[error("unsupported currency code: {0}")]
    UnknownCurrency(String),
}

/// ISO 4217 currency codes accepted by the gateway account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Format an amount for display, e.g. `$30.00`.
    #[must_use]
    pub fn display(self, amount: Decimal) -> String {
        format!("{}{}", self.symbol(), format_amount(amount))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(MoneyError::UnknownCurrency(s.to_owned())),
        }
    }
}

/// Largest unit price the ledger stores (`NUMERIC(12, 2)`).
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Largest order total the ledger stores (`NUMERIC(14, 2)`).
pub const MAX_TOTAL: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Parse a unit price such as `"10"` or `"19.99"`.
///
/// Only plain digits with an optional decimal point are accepted; signs,
/// exponents and thousands separators are rejected.
///
/// # Errors
///
/// Returns an error if the input is not a plain decimal, is not strictly
/// positive, carries more than two fractional digits or exceeds
/// [`MAX_UNIT_PRICE`].
pub fn parse_price(raw: &str) -> Result<Decimal, MoneyError> {
    let raw = raw.trim();
    let plain = !raw.is_empty()
        && raw.chars().all(|c| c.is_ascii_digit() || c == '.')
        && raw.matches('.').count() <= 1
        && !raw.starts_with('.')
        && !raw.ends_with('.');
    if !plain {
        return Err(MoneyError::NotANumber);
    }

    let price = Decimal::from_str(raw).map_err(|_| MoneyError::NotANumber)?;
    if price.scale() > 2 {
        return Err(MoneyError::TooPrecise);
    }
    if price <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }
    if price > MAX_UNIT_PRICE {
        return Err(MoneyError::TooLarge(MAX_UNIT_PRICE));
    }
    Ok(price)
}

/// Total for `quantity` units at `unit_price`.
///
/// # Errors
///
/// Returns `MoneyError::TooLarge` if the product overflows or exceeds
/// [`MAX_TOTAL`].
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, MoneyError> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .filter(|total| *total <= MAX_TOTAL)
        .ok_or(MoneyError::TooLarge(MAX_TOTAL))
}

/// Render an amount with exactly two fractional digits, e.g. `30.00`.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_parse_price_accepts_plain_decimals() {
        assert_eq!(parse_price("10").unwrap(), dec!(10));
        assert_eq!(parse_price("19.99").unwrap(), dec!(19.99));
        assert_eq!(parse_price(" 0.5 ").unwrap(), dec!(0.5));
    }

    #[test]
    fn test_parse_price_rejects_bad_input() {
        assert_eq!(parse_price("abc"), Err(MoneyError::NotANumber));
        assert_eq!(parse_price("-5"), Err(MoneyError::NotANumber));
        assert_eq!(parse_price("1e3"), Err(MoneyError::NotANumber));
        assert_eq!(parse_price("1.2.3"), Err(MoneyError::NotANumber));
        assert_eq!(parse_price("10."), Err(MoneyError::NotANumber));
        assert_eq!(parse_price("0"), Err(MoneyError::NotPositive));
        assert_eq!(parse_price("0.00"), Err(MoneyError::NotPositive));
        assert_eq!(parse_price("1.999"), Err(MoneyError::TooPrecise));
    }

    #[test]
    fn test_parse_price_upper_bound() {
        assert_eq!(MAX_UNIT_PRICE, dec!(9999999999.99));
        assert_eq!(parse_price("9999999999.99").unwrap(), MAX_UNIT_PRICE);
        assert_eq!(
            parse_price("10000000000"),
            Err(MoneyError::TooLarge(MAX_UNIT_PRICE))
        );
        assert_eq!(
            parse_price("100000000000000000000"),
            Err(MoneyError::TooLarge(MAX_UNIT_PRICE))
        );
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(dec!(10.00), 3).unwrap(), dec!(30.00));
        assert_eq!(line_total(dec!(0.33), 3).unwrap(), dec!(0.99));
    }

    #[test]
    fn test_line_total_upper_bound() {
        assert_eq!(MAX_TOTAL, dec!(999999999999.99));
        assert_eq!(line_total(MAX_UNIT_PRICE, 100).unwrap(), dec!(999999999999.00));
        assert_eq!(
            line_total(MAX_UNIT_PRICE, 101),
            Err(MoneyError::TooLarge(MAX_TOTAL))
        );
        assert_eq!(
            line_total(MAX_UNIT_PRICE, i32::MAX),
            Err(MoneyError::TooLarge(MAX_TOTAL))
        );
        assert_eq!(
            line_total(Decimal::MAX, 1_000_000_000),
            Err(MoneyError::TooLarge(MAX_TOTAL))
        );
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(30)), "30.00");
        assert_eq!(format_amount(dec!(30.5)), "30.50");
        assert_eq!(format_amount(dec!(19.99)), "19.99");
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(CurrencyCode::USD.display(dec!(30)), "$30.00");
        assert_eq!(CurrencyCode::GBP.display(dec!(1.5)), "£1.50");
        assert_eq!("eur".parse::<CurrencyCode>().unwrap(), CurrencyCode::EUR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
