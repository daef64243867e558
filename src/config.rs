use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{CreditError, Result};
use crate::payments::PenaltyPolicy;

/// credit engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreditConfig {
    /// overdue surcharge, percent of the amount due
    #[serde(default = "default_penalty_percentage")]
    pub penalty_percentage: Decimal,
    /// period of the due-payment scan
    #[serde(default = "default_due_tick_secs")]
    pub due_tick_secs: u64,
    /// period of the overdue re-attempt scan
    #[serde(default = "default_overdue_tick_secs")]
    pub overdue_tick_secs: u64,
    /// settle the credit when a scheduled payment resolves its last installment
    #[serde(default = "default_settle_on_scheduled_payoff")]
    pub settle_on_scheduled_payoff: bool,
}

impl Default for CreditConfig {
    fn default() -> Self {
        CreditConfig {
            penalty_percentage: default_penalty_percentage(),
            due_tick_secs: default_due_tick_secs(),
            overdue_tick_secs: default_overdue_tick_secs(),
            settle_on_scheduled_payoff: default_settle_on_scheduled_payoff(),
        }
    }
}

fn default_penalty_percentage() -> Decimal {
    dec!(10)
}

fn default_due_tick_secs() -> u64 {
    8 * 60 * 60
}

fn default_overdue_tick_secs() -> u64 {
    60 * 60
}

fn default_settle_on_scheduled_payoff() -> bool {
    true
}

impl CreditConfig {
    /// parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CreditConfig = serde_json::from_str(json).map_err(|e| {
            CreditError::InvalidConfiguration {
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.due_tick_secs == 0 || self.overdue_tick_secs == 0 {
            return Err(CreditError::InvalidConfiguration {
                message: "scheduler intervals must be positive".to_string(),
            });
        }
        PenaltyPolicy::new(self.penalty_percentage)?;
        Ok(())
    }

    pub fn penalty_policy(&self) -> Result<PenaltyPolicy> {
        PenaltyPolicy::new(self.penalty_percentage)
    }

    pub fn due_tick_interval(&self) -> Duration {
        Duration::from_secs(self.due_tick_secs)
    }

    pub fn overdue_tick_interval(&self) -> Duration {
        Duration::from_secs(self.overdue_tick_secs)
    }
}
