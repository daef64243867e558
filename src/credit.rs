use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::payments::amortization::AmortizationSchedule;
use crate::types::{AccountId, CreditId, CreditStatus, PaymentId, PaymentStatus};

/// a fixed-rate annuity credit disbursed to one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: CreditId,
    pub account_id: AccountId,
    pub principal: Money,
    pub rate: Rate,
    pub term_months: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: CreditStatus,
    pub created_at: DateTime<Utc>,
}

impl Credit {
    pub fn is_active(&self) -> bool {
        self.status == CreditStatus::Active
    }

    /// move to a new status, returning the previous one
    pub fn update_status(&mut self, status: CreditStatus) -> CreditStatus {
        std::mem::replace(&mut self.status, status)
    }
}

/// credit row before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewCredit {
    pub account_id: AccountId,
    pub principal: Money,
    pub rate: Rate,
    pub term_months: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// one installment of a credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub credit_id: CreditId,
    pub payment_number: u32,
    pub pay_date: DateTime<Utc>,
    /// what the borrower owes now, including any overdue surcharge, or what was actually paid
    pub amount: Money,
    /// scheduled installment, never changed after generation
    pub original_amount: Money,
    pub real_pay_date: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub status: PaymentStatus,
}

impl Payment {
    pub fn is_unresolved(&self) -> bool {
        self.status.is_unresolved()
    }

    /// settle this installment with `amount` at `paid_at`
    pub fn mark_paid(&mut self, amount: Money, paid_at: DateTime<Utc>) {
        self.amount = amount;
        self.status = PaymentStatus::Paid;
        self.real_pay_date = Some(paid_at);
    }

    /// flag overdue and raise the amount due by `surcharge`
    pub fn mark_overdue(&mut self, surcharge: Money) {
        self.is_overdue = true;
        self.status = PaymentStatus::Overdue;
        self.amount = (self.amount + surcharge).to_cents();
    }
}

/// payment row before the store assigns an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub payment_number: u32,
    pub pay_date: DateTime<Utc>,
    pub amount: Money,
}

impl NewPayment {
    /// planned rows for every installment of a schedule
    pub fn from_schedule(schedule: &AmortizationSchedule) -> Vec<NewPayment> {
        schedule
            .payments
            .iter()
            .map(|p| NewPayment {
                payment_number: p.payment_number,
                pay_date: p.payment_date,
                amount: p.payment_amount,
            })
            .collect()
    }

    pub fn into_payment(self, id: PaymentId, credit_id: CreditId) -> Payment {
        Payment {
            id,
            credit_id,
            payment_number: self.payment_number,
            pay_date: self.pay_date,
            amount: self.amount,
            original_amount: self.amount,
            real_pay_date: None,
            is_overdue: false,
            status: PaymentStatus::Planned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn planned() -> Payment {
        NewPayment {
            payment_number: 1,
            pay_date: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            amount: Money::from_str_exact("1000.00").unwrap(),
        }
        .into_payment(10, 1)
    }

    #[test]
    fn test_new_payment_starts_planned() {
        let payment = planned();
        assert_eq!(payment.status, PaymentStatus::Planned);
        assert_eq!(payment.amount, payment.original_amount);
        assert!(!payment.is_overdue);
        assert!(payment.real_pay_date.is_none());
    }

    #[test]
    fn test_overdue_keeps_original_amount() {
        let mut payment = planned();
        payment.mark_overdue(Money::from_major(100));

        assert_eq!(payment.status, PaymentStatus::Overdue);
        assert!(payment.is_overdue);
        assert_eq!(payment.amount, Money::from_major(1_100));
        assert_eq!(payment.original_amount, Money::from_major(1_000));
        assert!(payment.is_unresolved());
    }

    #[test]
    fn test_mark_paid_records_actual_amount() {
        let mut payment = planned();
        let paid_at = Utc.with_ymd_and_hms(2024, 2, 3, 12, 0, 0).unwrap();
        payment.mark_paid(Money::from_major(1_250), paid_at);

        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.amount, Money::from_major(1_250));
        assert_eq!(payment.real_pay_date, Some(paid_at));
        assert!(!payment.is_unresolved());
    }
}
