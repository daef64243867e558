use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};

/// scheduled payment in amortization schedule
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledPayment {
    pub payment_number: u32,
    pub payment_date: DateTime<Utc>,
    pub beginning_balance: Money,
    pub payment_amount: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub ending_balance: Money,
}

/// amortization schedule of a fixed-rate annuity loan
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationSchedule {
    pub principal: Money,
    pub interest_rate: Rate,
    pub term_months: u32,
    pub start_date: DateTime<Utc>,
    /// unrounded annuity installment
    pub annuity_payment: Money,
    pub payments: Vec<ScheduledPayment>,
    pub total_interest: Money,
    pub total_payment: Money,
}

impl AmortizationSchedule {
    /// generate the monthly annuity schedule
    ///
    /// Installments are whole cents. Interest is charged on the remaining balance each period and
    /// the last installment absorbs whatever residual rounding left, so the principal portions sum
    /// to exactly `principal`.
    pub fn generate(
        principal: Money,
        interest_rate: Rate,
        term_months: i32,
        start_date: DateTime<Utc>,
    ) -> Result<Self> {
        if !principal.is_positive() {
            return Err(CreditError::InvalidAmount { amount: principal });
        }

        let annuity_payment = compute_annuity_payment(principal, interest_rate, term_months)?;
        let term = term_months as u32;
        let monthly_rate = interest_rate.monthly_rate().as_decimal();
        let installment = annuity_payment.to_cents();
        let overflow = || CreditError::ScheduleOverflow {
            principal,
            months: term_months,
        };

        let mut payments = Vec::with_capacity(term as usize);
        let mut balance = principal;

        for i in 1..=term {
            let payment_date = add_months(start_date, i)?;
            let interest_portion = balance
                .as_decimal()
                .checked_mul(monthly_rate)
                .map(|d| Money::from_decimal(d).to_cents())
                .ok_or_else(overflow)?;

            let principal_portion = if i == term {
                balance
            } else {
                (installment - interest_portion).min(balance)
            };
            let payment_amount = principal_portion
                .as_decimal()
                .checked_add(interest_portion.as_decimal())
                .map(Money::from_decimal)
                .ok_or_else(overflow)?;
            let ending_balance = balance - principal_portion;

            payments.push(ScheduledPayment {
                payment_number: i,
                payment_date,
                beginning_balance: balance,
                payment_amount,
                principal_portion,
                interest_portion,
                ending_balance,
            });

            balance = ending_balance;
        }

        let total_interest = checked_total(payments.iter().map(|p| p.interest_portion)).ok_or_else(overflow)?;
        let total_payment = checked_total(payments.iter().map(|p| p.payment_amount)).ok_or_else(overflow)?;

        Ok(Self {
            principal,
            interest_rate,
            term_months: term,
            start_date,
            annuity_payment,
            payments,
            total_interest,
            total_payment,
        })
    }

    /// get payment for specific period (1-based)
    pub fn get_payment(&self, payment_number: u32) -> Option<&ScheduledPayment> {
        payment_number
            .checked_sub(1)
            .and_then(|idx| self.payments.get(idx as usize))
    }

    /// due date of the last installment
    pub fn maturity_date(&self) -> DateTime<Utc> {
        self.payments
            .last()
            .map(|p| p.payment_date)
            .unwrap_or(self.start_date)
    }
}

/// longest accepted term, 100 years
pub const MAX_TERM_MONTHS: i32 = 1200;

/// fixed monthly annuity payment at full precision
///
/// `payment = P * r * (1 + r)^n / ((1 + r)^n - 1)` with `r` the monthly rate. A zero rate
/// degenerates to `P / n`. The growth factor is divided out before scaling by the principal so
/// long high-rate terms stay in range.
pub fn compute_annuity_payment(principal: Money, annual_rate: Rate, term_months: i32) -> Result<Money> {
    if term_months <= 0 || term_months > MAX_TERM_MONTHS {
        return Err(CreditError::InvalidTerm { months: term_months });
    }

    let r = annual_rate.monthly_rate().as_decimal();
    let n = term_months as u32;

    if r.is_zero() {
        return Ok(principal / Decimal::from(n));
    }

    let overflow = || CreditError::ScheduleOverflow {
        principal,
        months: term_months,
    };

    let base = Decimal::ONE + r;
    let mut compound = Decimal::ONE;
    for _ in 0..n {
        compound = compound.checked_mul(base).ok_or_else(overflow)?;
    }

    let payment = compound
        .checked_div(compound - Decimal::ONE)
        .and_then(|factor| factor.checked_mul(r))
        .and_then(|scale| scale.checked_mul(principal.as_decimal()))
        .ok_or_else(overflow)?;

    Ok(Money::from_decimal(payment))
}

fn checked_total(mut amounts: impl Iterator<Item = Money>) -> Option<Money> {
    amounts
        .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.as_decimal()))
        .map(Money::from_decimal)
}

/// full installment plan for a credit starting at `start_date`
pub fn generate_schedule(
    principal: Money,
    annual_rate: Rate,
    term_months: i32,
    start_date: DateTime<Utc>,
) -> Result<AmortizationSchedule> {
    AmortizationSchedule::generate(principal, annual_rate, term_months, start_date)
}

/// calendar month addition anchored on the start date, clamping to month end
pub(crate) fn add_months(date: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| CreditError::InvalidTerm { months: months as i32 })
}
