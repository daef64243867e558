use parking_lot::Mutex;

use crate::decimal::Rate;
use crate::errors::{CreditError, Result};

/// source of the annual rate applied to newly issued credits
pub trait RateSource: Send + Sync {
    /// current annual rate
    fn current_rate(&self) -> Result<Rate>;
}

/// always returns the same rate
#[derive(Debug, Clone, Copy)]
pub struct FixedRateSource {
    rate: Rate,
}

impl FixedRateSource {
    pub fn new(rate: Rate) -> Self {
        Self { rate }
    }
}

impl RateSource for FixedRateSource {
    fn current_rate(&self) -> Result<Rate> {
        Ok(self.rate)
    }
}

/// mock rate source for testing
#[derive(Debug, Default)]
pub struct MockRateSource {
    rate: Mutex<Option<Rate>>,
}

impl MockRateSource {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate: Mutex::new(Some(rate)),
        }
    }

    /// a source that is down
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn set_rate(&self, rate: Option<Rate>) {
        *self.rate.lock() = rate;
    }
}

impl RateSource for MockRateSource {
    fn current_rate(&self) -> Result<Rate> {
        let rate = *self.rate.lock();
        rate.ok_or_else(|| CreditError::RateUnavailable {
            message: "central bank rate feed unavailable".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_rate_source() {
        let source = MockRateSource::new(Rate::from_percentage(16));
        assert_eq!(source.current_rate().unwrap(), Rate::from_percentage(16));

        source.set_rate(None);
        assert!(matches!(source.current_rate(), Err(CreditError::RateUnavailable { .. })));

        assert!(MockRateSource::unavailable().current_rate().is_err());
        assert_eq!(
            FixedRateSource::new(Rate::from_percentage(9)).current_rate().unwrap(),
            Rate::from_percentage(9)
        );
    }
}
