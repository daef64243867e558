use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use serde::Serialize;
use tracing::instrument;

use crate::credit::Credit;
use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::notify::Notifier;
use crate::payments::penalty::PenaltyPolicy;
use crate::store::{Store, StoreTx};
use crate::types::{AccountId, CreditId, CreditStatus, PaymentId};
use crate::views::PaymentView;

/// what a scheduled application did to one payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduledOutcome {
    /// the current amount due was collected
    Paid { amount: Money, settled: bool },
    /// funds were short; the payment was flagged overdue and surcharged
    Escalated { surcharge: Money, amount_due: Money },
    /// funds still short on an already escalated payment, left for a later tick
    Deferred,
    /// nothing left to collect: the payment or its credit was resolved elsewhere
    Resolved,
}

/// payoff detected inside a unit, delivered once the unit has committed
struct Settlement {
    credit_id: CreditId,
    holder_email: String,
}

/// applies installments, manually on request or from the scheduler
pub struct PaymentProcessor<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    time: Arc<SafeTimeProvider>,
    penalty: PenaltyPolicy,
    settle_on_scheduled_payoff: bool,
}

impl<S: Store> PaymentProcessor<S> {
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        time: Arc<SafeTimeProvider>,
        penalty: PenaltyPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            time,
            penalty,
            settle_on_scheduled_payoff: true,
        }
    }

    /// whether a scheduled payment resolving the last installment settles the credit
    pub fn with_scheduled_payoff(mut self, enabled: bool) -> Self {
        self.settle_on_scheduled_payoff = enabled;
        self
    }

    /// pay the earliest planned installment of a credit from its account
    ///
    /// `amount` must cover the installment; any excess is recorded as the paid amount.
    #[instrument(name = "credit.payment.pay_credit", skip(self), err)]
    pub fn pay_credit(
        &self,
        credit_id: CreditId,
        account_id: AccountId,
        amount: Money,
    ) -> Result<PaymentView> {
        if !amount.is_positive() || amount != amount.to_cents() {
            return Err(CreditError::InvalidAmount { amount });
        }

        let now = self.time.now();

        let (payment, settlement) = self.store.atomically(|tx| {
            let mut credit = tx
                .credit(credit_id)?
                .ok_or(CreditError::CreditNotFound { id: credit_id })?;

            if !credit.is_active() {
                return Err(CreditError::CreditNotActive {
                    id: credit_id,
                    status: credit.status,
                });
            }
            if credit.account_id != account_id {
                return Err(CreditError::AccountMismatch {
                    credit: credit_id,
                    expected: credit.account_id,
                    provided: account_id,
                });
            }

            let mut account = tx
                .account(account_id)?
                .ok_or(CreditError::AccountNotFound { id: account_id })?;
            if !account.has_funds(amount) {
                return Err(CreditError::InsufficientFunds {
                    available: account.balance,
                    requested: amount,
                });
            }

            let mut payment = tx
                .next_planned_payment(credit_id)?
                .ok_or(CreditError::NoPlannedPayment { id: credit_id })?;
            if amount < payment.amount {
                return Err(CreditError::AmountTooLow {
                    due: payment.amount,
                    provided: amount,
                });
            }

            let entry = account.debit_for_payment(amount, payment.id, now)?;
            payment.mark_paid(amount, now);
            tx.save_payment(&payment)?;
            tx.save_account(&account)?;
            tx.insert_transaction(entry)?;

            let settlement = settle_if_resolved(tx, &mut credit, &account.holder_email)?;
            Ok((payment, settlement))
        })?;

        tracing::info!(
            credit_id,
            payment_id = payment.id,
            amount = %amount,
            "Credit payment applied"
        );
        self.deliver(settlement);

        Ok(PaymentView::from(&payment))
    }

    /// collect a due or overdue installment on behalf of the scheduler
    ///
    /// Runs in its own atomic unit and always collects the payment's current amount due.
    #[instrument(name = "credit.payment.apply_scheduled", skip(self), err)]
    pub fn apply_scheduled(&self, payment_id: PaymentId) -> Result<ScheduledOutcome> {
        let now = self.time.now();

        let (outcome, settlement) = self.store.atomically(|tx| {
            let mut payment = tx
                .payment(payment_id)?
                .ok_or(CreditError::PaymentNotFound { id: payment_id })?;
            if !payment.is_unresolved() {
                return Ok((ScheduledOutcome::Resolved, None));
            }

            let mut credit = tx
                .credit(payment.credit_id)?
                .ok_or(CreditError::CreditNotFound { id: payment.credit_id })?;
            if credit.status.is_terminal() {
                return Ok((ScheduledOutcome::Resolved, None));
            }

            let mut account = tx
                .account(credit.account_id)?
                .ok_or(CreditError::AccountNotFound { id: credit.account_id })?;

            if !account.has_funds(payment.amount) {
                if payment.is_overdue {
                    return Ok((ScheduledOutcome::Deferred, None));
                }

                let surcharge = self.penalty.surcharge(payment.amount);
                payment.mark_overdue(surcharge);
                tx.save_payment(&payment)?;
                credit.update_status(CreditStatus::Overdue);
                tx.save_credit(&credit)?;

                return Ok((
                    ScheduledOutcome::Escalated {
                        surcharge,
                        amount_due: payment.amount,
                    },
                    None,
                ));
            }

            let amount = payment.amount;
            let entry = account.debit_for_payment(amount, payment.id, now)?;
            payment.mark_paid(amount, now);
            tx.save_payment(&payment)?;
            tx.save_account(&account)?;
            tx.insert_transaction(entry)?;

            let settlement = if self.settle_on_scheduled_payoff {
                settle_if_resolved(tx, &mut credit, &account.holder_email)?
            } else {
                None
            };
            let settled = settlement.is_some();

            Ok((ScheduledOutcome::Paid { amount, settled }, settlement))
        })?;

        match outcome {
            ScheduledOutcome::Paid { amount, .. } => {
                tracing::info!(payment_id, amount = %amount, "Scheduled payment collected");
            }
            ScheduledOutcome::Escalated { surcharge, amount_due } => {
                tracing::info!(
                    payment_id,
                    surcharge = %surcharge,
                    amount_due = %amount_due,
                    "Payment escalated to overdue"
                );
            }
            ScheduledOutcome::Deferred | ScheduledOutcome::Resolved => {
                tracing::debug!(payment_id, outcome = ?outcome, "Scheduled payment left unchanged");
            }
        }
        self.deliver(settlement);

        Ok(outcome)
    }

    fn deliver(&self, settlement: Option<Settlement>) {
        let Some(Settlement { credit_id, holder_email }) = settlement else {
            return;
        };

        tracing::info!(credit_id, "Credit paid off");
        if let Err(e) = self.notifier.notify_credit_paid_off(&holder_email, credit_id) {
            tracing::warn!(credit_id, error = %e, "Payoff notification not delivered");
        }
    }
}

/// settle the credit when no installment is left to collect
fn settle_if_resolved(
    tx: &mut dyn StoreTx,
    credit: &mut Credit,
    holder_email: &str,
) -> Result<Option<Settlement>> {
    if tx.count_unresolved_payments(credit.id)? > 0 {
        return Ok(None);
    }

    credit.update_status(CreditStatus::Paid);
    tx.save_credit(credit)?;

    Ok(Some(Settlement {
        credit_id: credit.id,
        holder_email: holder_email.to_string(),
    }))
}
