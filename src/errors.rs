use thiserror::Error;

use crate::decimal::Money;
use crate::types::{AccountId, CreditId, CreditStatus, PaymentId, UserId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CreditError {
    #[error("account not found: {id}")]
    AccountNotFound {
        id: AccountId,
    },

    #[error("credit not found: {id}")]
    CreditNotFound {
        id: CreditId,
    },

    #[error("payment not found: {id}")]
    PaymentNotFound {
        id: PaymentId,
    },

    #[error("access denied: user {requester} does not hold account {account}")]
    Forbidden {
        account: AccountId,
        requester: UserId,
    },

    #[error("account mismatch: credit {credit} belongs to account {expected}, got {provided}")]
    AccountMismatch {
        credit: CreditId,
        expected: AccountId,
        provided: AccountId,
    },

    #[error("account {account} already has an active credit {existing}")]
    ActiveCreditExists {
        account: AccountId,
        existing: CreditId,
    },

    #[error("credit {id} not active: current status is {status}")]
    CreditNotActive {
        id: CreditId,
        status: CreditStatus,
    },

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Money,
        requested: Money,
    },

    #[error("payment less than amount due: due {due}, provided {provided}")]
    AmountTooLow {
        due: Money,
        provided: Money,
    },

    #[error("no planned payments left for credit {id}")]
    NoPlannedPayment {
        id: CreditId,
    },

    #[error("interest rate unavailable: {message}")]
    RateUnavailable {
        message: String,
    },

    #[error("invalid term: {months} months")]
    InvalidTerm {
        months: i32,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("schedule out of range: {principal} over {months} months")]
    ScheduleOverflow {
        principal: Money,
        months: i32,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("storage failure: {message}")]
    StorageFailure {
        message: String,
    },
}

/// coarse classification used by the request layer to pick a response code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Mismatch,
    Conflict,
    InsufficientFunds,
    AmountTooLow,
    NoPlannedPayment,
    RateUnavailable,
    InvalidTerm,
    InvalidInput,
    StorageFailure,
}

impl CreditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CreditError::AccountNotFound { .. }
            | CreditError::CreditNotFound { .. }
            | CreditError::PaymentNotFound { .. } => ErrorKind::NotFound,
            CreditError::Forbidden { .. } => ErrorKind::Forbidden,
            CreditError::AccountMismatch { .. } => ErrorKind::Mismatch,
            CreditError::ActiveCreditExists { .. } | CreditError::CreditNotActive { .. } => {
                ErrorKind::Conflict
            }
            CreditError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            CreditError::AmountTooLow { .. } => ErrorKind::AmountTooLow,
            CreditError::NoPlannedPayment { .. } => ErrorKind::NoPlannedPayment,
            CreditError::RateUnavailable { .. } => ErrorKind::RateUnavailable,
            CreditError::InvalidTerm { .. } => ErrorKind::InvalidTerm,
            CreditError::InvalidAmount { .. }
            | CreditError::ScheduleOverflow { .. }
            | CreditError::InvalidConfiguration { .. } => ErrorKind::InvalidInput,
            CreditError::StorageFailure { .. } => ErrorKind::StorageFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, CreditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = CreditError::ActiveCreditExists { account: 1, existing: 7 };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "account 1 already has an active credit 7");

        let err = CreditError::CreditNotActive { id: 3, status: CreditStatus::Paid };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "credit 3 not active: current status is PAID");

        assert_eq!(CreditError::InvalidTerm { months: 0 }.kind(), ErrorKind::InvalidTerm);
        assert_eq!(CreditError::CreditNotFound { id: 9 }.kind(), ErrorKind::NotFound);
    }
}
