use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{CreditError, Result};

/// surcharge applied once when a due installment cannot be collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyPolicy {
    /// percent of the amount due (10 for 10%)
    pub percentage: Decimal,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self { percentage: dec!(10) }
    }
}

impl PenaltyPolicy {
    pub fn new(percentage: Decimal) -> Result<Self> {
        if percentage < Decimal::ZERO {
            return Err(CreditError::InvalidConfiguration {
                message: format!("penalty percentage must not be negative, got {}", percentage),
            });
        }
        Ok(Self { percentage })
    }

    /// surcharge in cents on `amount_due`
    pub fn surcharge(&self, amount_due: Money) -> Money {
        amount_due.percentage(self.percentage).to_cents()
    }
}
