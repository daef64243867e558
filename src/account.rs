use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::types::{AccountId, PaymentId, TransactionId, TransactionKind, UserId};

pub const DISBURSEMENT_DESCRIPTION: &str = "Credit issuance";
pub const PAYMENT_DESCRIPTION: &str = "Credit payment";

/// bank account row owned by the account ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub number: String,
    pub holder_id: UserId,
    pub holder_email: String,
    pub balance: Money,
}

impl Account {
    pub fn has_funds(&self, amount: Money) -> bool {
        self.balance >= amount
    }

    /// add funds, returning the audit entry to persist alongside
    pub fn credit(&mut self, amount: Money, description: &str, at: DateTime<Utc>) -> NewTransaction {
        let balance_before = self.balance;
        self.balance += amount;

        NewTransaction {
            account_id: self.id,
            amount,
            kind: TransactionKind::Deposit,
            description: description.to_string(),
            balance_before,
            balance_after: self.balance,
            payment_id: None,
            reference: Uuid::new_v4(),
            created_at: at,
        }
    }

    /// take funds for a credit installment; the balance may never go negative
    pub fn debit_for_payment(
        &mut self,
        amount: Money,
        payment_id: PaymentId,
        at: DateTime<Utc>,
    ) -> Result<NewTransaction> {
        if !self.has_funds(amount) {
            return Err(CreditError::InsufficientFunds {
                available: self.balance,
                requested: amount,
            });
        }

        let balance_before = self.balance;
        self.balance -= amount;

        Ok(NewTransaction {
            account_id: self.id,
            amount: -amount,
            kind: TransactionKind::Withdraw,
            description: PAYMENT_DESCRIPTION.to_string(),
            balance_before,
            balance_after: self.balance,
            payment_id: Some(payment_id),
            reference: Uuid::new_v4(),
            created_at: at,
        })
    }
}

/// append-only audit entry for a balance movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    /// signed: positive for deposits, negative for withdrawals
    pub amount: Money,
    pub kind: TransactionKind,
    pub description: String,
    pub balance_before: Money,
    pub balance_after: Money,
    pub payment_id: Option<PaymentId>,
    pub reference: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub amount: Money,
    pub kind: TransactionKind,
    pub description: String,
    pub balance_before: Money,
    pub balance_after: Money,
    pub payment_id: Option<PaymentId>,
    pub reference: Uuid,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn into_record(self, id: TransactionId) -> TransactionRecord {
        TransactionRecord {
            id,
            account_id: self.account_id,
            amount: self.amount,
            kind: self.kind,
            description: self.description,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            payment_id: self.payment_id,
            reference: self.reference,
            created_at: self.created_at,
        }
    }
}
