//! Human-facing invoice numbers.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::PaymentId;

/// Invoice number printed on the document and stored on the invoice row.
///
/// Derived from the payment id alone, so recomputing it for the same
/// payment always yields the same value.
///
/// ```
/// use helix_core::{InvoiceNumber, PaymentId};
///
/// let number = InvoiceNumber::for_payment(PaymentId::new(42));
/// assert_eq!(number.as_str(), "INV-00000042");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    #[must_use]
    pub fn for_payment(payment_id: PaymentId) -> Self {
        Self(format!("INV-{:08}", payment_id.as_i32()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_payment_is_stable() {
        let a = InvoiceNumber::for_payment(PaymentId::new(7));
        let b = InvoiceNumber::for_payment(PaymentId::new(7));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "INV-00000007");
    }

    #[test]
    fn test_wide_ids_are_not_truncated() {
        let number = InvoiceNumber::for_payment(PaymentId::new(123_456_789));
        assert_eq!(number.as_str(), "INV-123456789");
    }
}
