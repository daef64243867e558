use serde::{Deserialize, Serialize};
use std::fmt;

/// opaque numeric identifiers assigned by the store
pub type CreditId = u64;
pub type PaymentId = u64;
pub type AccountId = u64;
pub type UserId = u64;
pub type TransactionId = u64;

/// credit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditStatus {
    /// disbursed and performing
    Active,
    /// every payment resolved
    Paid,
    /// at least one payment escalated
    Overdue,
    Canceled,
}

impl CreditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::Active => "ACTIVE",
            CreditStatus::Paid => "PAID",
            CreditStatus::Overdue => "OVERDUE",
            CreditStatus::Canceled => "CANCELED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CreditStatus::Paid | CreditStatus::Canceled)
    }
}

impl fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Planned,
    Paid,
    Overdue,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Planned => "PLANNED",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Overdue => "OVERDUE",
            PaymentStatus::Canceled => "CANCELED",
        }
    }

    /// still owed by the borrower
    pub fn is_unresolved(&self) -> bool {
        matches!(self, PaymentStatus::Planned | PaymentStatus::Overdue)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// kind of balance movement recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}
