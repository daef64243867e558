//! read-only projections handed to the request layer
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::Account;
use crate::credit::{Credit, Payment};
use crate::decimal::Money;
use crate::types::{AccountId, CreditId, CreditStatus, PaymentId, PaymentStatus, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentView {
    pub id: PaymentId,
    pub pay_date: DateTime<Utc>,
    pub amount: Money,
    pub init_amount: Money,
    pub is_overdue: bool,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_pay_date: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        PaymentView {
            id: payment.id,
            pay_date: payment.pay_date,
            amount: payment.amount,
            init_amount: payment.original_amount,
            is_overdue: payment.is_overdue,
            status: payment.status,
            real_pay_date: payment.real_pay_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderView {
    pub id: UserId,
    pub email: String,
}

/// the account a credit was disbursed to, as of the read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub number: String,
    pub balance: Money,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        AccountView {
            id: account.id,
            number: account.number.clone(),
            balance: account.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditView {
    pub id: CreditId,
    pub account_id: AccountId,
    /// annual rate in percent
    pub rate: Decimal,
    pub amount: Money,
    pub remaining_amount: Money,
    pub status: CreditStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// most recent pay date first
    pub payments: Vec<PaymentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_payment: Option<PaymentView>,
    pub holder: HolderView,
    pub account: AccountView,
}

impl CreditView {
    /// project a credit, its account and its payments (any order)
    pub fn new(credit: &Credit, account: &Account, payments: &[Payment]) -> Self {
        let mut ordered: Vec<&Payment> = payments.iter().collect();
        ordered.sort_by(|a, b| b.pay_date.cmp(&a.pay_date).then(b.id.cmp(&a.id)));

        let remaining_amount = ordered
            .iter()
            .filter(|p| p.is_unresolved())
            .map(|p| p.amount)
            .sum();

        let next_payment = ordered
            .iter()
            .rev()
            .find(|p| p.is_unresolved())
            .map(|p| PaymentView::from(*p));

        CreditView {
            id: credit.id,
            account_id: credit.account_id,
            rate: credit.rate.as_percentage(),
            amount: credit.principal,
            remaining_amount,
            status: credit.status,
            start_date: credit.start_date,
            end_date: credit.end_date,
            payments: ordered.into_iter().map(PaymentView::from).collect(),
            next_payment,
            holder: HolderView {
                id: account.holder_id,
                email: account.holder_email.clone(),
            },
            account: AccountView::from(account),
        }
    }
}
