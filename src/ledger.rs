use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use tracing::instrument;

use crate::account::{Account, DISBURSEMENT_DESCRIPTION};
use crate::credit::{Credit, NewCredit, NewPayment, Payment};
use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::payments::{generate_schedule, MAX_TERM_MONTHS};
use crate::rates::RateSource;
use crate::store::{Store, StoreTx};
use crate::types::{AccountId, CreditId, UserId};
use crate::views::CreditView;

/// owns credit issuance and the credit read paths
pub struct CreditLedger<S> {
    store: Arc<S>,
    rates: Arc<dyn RateSource>,
    time: Arc<SafeTimeProvider>,
}

impl<S> Clone for CreditLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            rates: Arc::clone(&self.rates),
            time: Arc::clone(&self.time),
        }
    }
}

impl<S: Store> CreditLedger<S> {
    pub fn new(store: Arc<S>, rates: Arc<dyn RateSource>, time: Arc<SafeTimeProvider>) -> Self {
        Self { store, rates, time }
    }

    /// issue a credit and disburse `amount` to the account
    ///
    /// Eligibility is checked before the rate is fetched, and again inside the unit that writes
    /// the credit row, its whole payment schedule, the balance increase and the disbursement
    /// transaction. The rate source is never called while the store is held.
    #[instrument(name = "credit.ledger.create_credit", skip(self), err)]
    pub fn create_credit(
        &self,
        account_id: AccountId,
        requester_id: UserId,
        amount: Money,
        term_months: i32,
    ) -> Result<CreditView> {
        if !amount.is_positive() || amount != amount.to_cents() {
            return Err(CreditError::InvalidAmount { amount });
        }
        if !(1..=MAX_TERM_MONTHS).contains(&term_months) {
            return Err(CreditError::InvalidTerm { months: term_months });
        }

        self.store
            .atomically(|tx| eligible_account(tx, account_id, requester_id).map(|_| ()))?;

        let rate = self.current_rate()?;
        let now = self.time.now();
        let schedule = generate_schedule(amount, rate, term_months, now)?;

        let (credit, account, payments) = self.store.atomically(|tx| {
            let mut account = eligible_account(tx, account_id, requester_id)?;

            let credit = tx.insert_credit(NewCredit {
                account_id,
                principal: amount,
                rate,
                term_months: schedule.term_months,
                start_date: now,
                end_date: schedule.maturity_date(),
                created_at: now,
            })?;
            let payments = tx.insert_payments(credit.id, NewPayment::from_schedule(&schedule))?;

            let entry = account.credit(amount, DISBURSEMENT_DESCRIPTION, now);
            tx.save_account(&account)?;
            tx.insert_transaction(entry)?;

            Ok((credit, account, payments))
        })?;

        tracing::info!(
            credit_id = credit.id,
            account_id,
            principal = %credit.principal,
            rate = %credit.rate,
            installments = payments.len(),
            "Credit disbursed"
        );

        Ok(CreditView::new(&credit, &account, &payments))
    }

    #[instrument(name = "credit.ledger.get_credit", skip(self), err)]
    pub fn get_credit(&self, id: CreditId) -> Result<CreditView> {
        self.store.atomically(|tx| {
            let credit = tx.credit(id)?.ok_or(CreditError::CreditNotFound { id })?;
            project_one(tx, &credit)
        })
    }

    #[instrument(name = "credit.ledger.get_credits_by_account", skip(self), err)]
    pub fn get_credits_by_account(&self, account_id: AccountId) -> Result<Vec<CreditView>> {
        self.store.atomically(|tx| {
            let credits = tx.credits_for_account(account_id)?;
            project(tx, credits)
        })
    }

    #[instrument(name = "credit.ledger.get_credits_by_user", skip(self), err)]
    pub fn get_credits_by_user(&self, user_id: UserId) -> Result<Vec<CreditView>> {
        self.store.atomically(|tx| {
            let mut credits = Vec::new();
            for account in tx.accounts_for_holder(user_id)? {
                credits.extend(tx.credits_for_account(account.id)?);
            }
            credits.sort_by_key(|c| c.id);
            project(tx, credits)
        })
    }

    fn current_rate(&self) -> Result<Rate> {
        self.rates.current_rate().map_err(|e| match e {
            CreditError::RateUnavailable { .. } => e,
            other => CreditError::RateUnavailable {
                message: other.to_string(),
            },
        })
    }
}

/// the requester's account, provided it can take a new credit
fn eligible_account(tx: &mut dyn StoreTx, account_id: AccountId, requester_id: UserId) -> Result<Account> {
    let account = tx
        .account(account_id)?
        .ok_or(CreditError::AccountNotFound { id: account_id })?;

    if account.holder_id != requester_id {
        return Err(CreditError::Forbidden {
            account: account_id,
            requester: requester_id,
        });
    }

    if let Some(existing) = tx.active_credit_for_account(account_id)? {
        return Err(CreditError::ActiveCreditExists {
            account: account_id,
            existing: existing.id,
        });
    }

    Ok(account)
}

fn project_one(tx: &mut dyn StoreTx, credit: &Credit) -> Result<CreditView> {
    let account = tx
        .account(credit.account_id)?
        .ok_or(CreditError::AccountNotFound { id: credit.account_id })?;
    let payments: Vec<Payment> = tx.payments_for_credit(credit.id)?;
    Ok(CreditView::new(credit, &account, &payments))
}

fn project(tx: &mut dyn StoreTx, credits: Vec<Credit>) -> Result<Vec<CreditView>> {
    credits.iter().map(|credit| project_one(tx, credit)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    use crate::rates::{FixedRateSource, MockRateSource};
    use crate::store::InMemoryStore;
    use crate::types::{CreditStatus, PaymentStatus, TransactionKind};

    struct Fixture {
        store: Arc<InMemoryStore>,
        ledger: CreditLedger<InMemoryStore>,
        account_id: AccountId,
    }

    fn fixture_with_rates(rates: Arc<dyn RateSource>) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(),
        )));
        let account = store.open_account(7, "holder@example.com", Money::from_major(500));
        Fixture {
            ledger: CreditLedger::new(Arc::clone(&store), rates, time),
            store,
            account_id: account.id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_rates(Arc::new(FixedRateSource::new(Rate::from_percentage(12))))
    }

    #[test]
    fn test_create_credit_disburses_and_schedules() {
        let f = fixture();
        let view = f.ledger.create_credit(f.account_id, 7, Money::from_major(120_000), 12).unwrap();

        assert_eq!(view.status, CreditStatus::Active);
        assert_eq!(view.rate, dec!(12));
        assert_eq!(view.payments.len(), 12);
        assert!(view.payments.iter().all(|p| p.status == PaymentStatus::Planned && !p.is_overdue));
        assert_eq!(view.end_date, Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap());
        assert_eq!(
            view.next_payment.as_ref().unwrap().pay_date,
            Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap()
        );

        let account = f.store.account(f.account_id).unwrap();
        assert_eq!(account.balance, Money::from_major(120_500));

        let transactions = f.store.transactions();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, TransactionKind::Deposit);
        assert_eq!(transactions[0].amount, Money::from_major(120_000));
        assert_eq!(transactions[0].description, "Credit issuance");
    }

    #[test]
    fn test_second_active_credit_conflicts() {
        let f = fixture();
        let first = f.ledger.create_credit(f.account_id, 7, Money::from_major(10_000), 6).unwrap();

        let err = f.ledger.create_credit(f.account_id, 7, Money::from_major(5_000), 6).unwrap_err();
        assert_eq!(err, CreditError::ActiveCreditExists { account: f.account_id, existing: first.id });

        // nothing new was written
        assert_eq!(f.store.credits().len(), 1);
        assert_eq!(f.store.transactions().len(), 1);
        assert_eq!(f.store.account(f.account_id).unwrap().balance, Money::from_major(10_500));
    }

    #[test]
    fn test_new_credit_allowed_after_payoff() {
        let f = fixture();
        let first = f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), 1).unwrap();

        f.store.atomically(|tx| {
            let mut credit = tx.credit(first.id)?.unwrap();
            credit.update_status(CreditStatus::Paid);
            tx.save_credit(&credit)
        }).unwrap();

        assert!(f.ledger.create_credit(f.account_id, 7, Money::from_major(2_000), 3).is_ok());
    }

    #[test]
    fn test_ownership_and_existence_checks() {
        let f = fixture();

        let err = f.ledger.create_credit(999, 7, Money::from_major(1_000), 6).unwrap_err();
        assert_eq!(err, CreditError::AccountNotFound { id: 999 });

        let err = f.ledger.create_credit(f.account_id, 8, Money::from_major(1_000), 6).unwrap_err();
        assert_eq!(err, CreditError::Forbidden { account: f.account_id, requester: 8 });

        assert!(f.store.credits().is_empty());
    }

    #[test]
    fn test_input_validation() {
        let f = fixture();

        assert!(matches!(
            f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), 0),
            Err(CreditError::InvalidTerm { months: 0 })
        ));
        assert!(matches!(
            f.ledger.create_credit(f.account_id, 7, Money::ZERO, 12),
            Err(CreditError::InvalidAmount { .. })
        ));
        assert!(matches!(
            f.ledger.create_credit(f.account_id, 7, Money::from_str_exact("10.005").unwrap(), 12),
            Err(CreditError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_rate_unavailable_writes_nothing() {
        let f = fixture_with_rates(Arc::new(MockRateSource::unavailable()));

        let err = f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), 6).unwrap_err();
        assert!(matches!(err, CreditError::RateUnavailable { .. }));
        assert!(f.store.credits().is_empty());
        assert_eq!(f.store.account(f.account_id).unwrap().balance, Money::from_major(500));
    }

    /// fails if asked for a rate while the store is held; can arm a commit failure for the unit
    /// that follows the fetch
    struct StoreAwareRates {
        store: Arc<InMemoryStore>,
        fail_following_commit: bool,
    }

    impl RateSource for StoreAwareRates {
        fn current_rate(&self) -> Result<Rate> {
            if self.store.is_locked() {
                return Err(CreditError::RateUnavailable {
                    message: "store held during rate fetch".to_string(),
                });
            }
            if self.fail_following_commit {
                self.store.fail_next_commit();
            }
            Ok(Rate::from_percentage(12))
        }
    }

    fn fixture_with_store_aware_rates(fail_following_commit: bool) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap(),
        )));
        let account = store.open_account(7, "holder@example.com", Money::from_major(500));
        let rates = Arc::new(StoreAwareRates {
            store: Arc::clone(&store),
            fail_following_commit,
        });
        Fixture {
            ledger: CreditLedger::new(Arc::clone(&store), rates, time),
            store,
            account_id: account.id,
        }
    }

    #[test]
    fn test_rate_fetched_outside_store_unit() {
        let f = fixture_with_store_aware_rates(false);

        let view = f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), 6).unwrap();
        assert_eq!(view.rate, dec!(12));
    }

    #[test]
    fn test_term_above_maximum_rejected() {
        let f = fixture();

        assert!(matches!(
            f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), MAX_TERM_MONTHS + 1),
            Err(CreditError::InvalidTerm { .. })
        ));
        assert!(matches!(
            f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), i32::MAX),
            Err(CreditError::InvalidTerm { .. })
        ));
        assert!(f.store.credits().is_empty());
    }

    #[test]
    fn test_long_high_rate_credit_is_issued_without_overflow() {
        let f = fixture_with_rates(Arc::new(FixedRateSource::new(Rate::from_percentage(40))));

        let view = f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000_000), MAX_TERM_MONTHS).unwrap();
        assert_eq!(view.payments.len(), MAX_TERM_MONTHS as usize);
    }

    #[test]
    fn test_commit_failure_leaves_no_partial_disbursement() {
        let f = fixture_with_store_aware_rates(true);

        let err = f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), 6).unwrap_err();
        assert!(matches!(err, CreditError::StorageFailure { .. }));
        assert!(f.store.credits().is_empty());
        assert!(f.store.transactions().is_empty());
        assert_eq!(f.store.account(f.account_id).unwrap().balance, Money::from_major(500));
    }

    #[test]
    fn test_read_paths() {
        let f = fixture();
        let other = f.store.open_account(7, "holder@example.com", Money::ZERO);
        let stranger = f.store.open_account(8, "someone@example.com", Money::ZERO);

        let a = f.ledger.create_credit(f.account_id, 7, Money::from_major(1_000), 3).unwrap();
        let b = f.ledger.create_credit(other.id, 7, Money::from_major(2_000), 2).unwrap();
        f.ledger.create_credit(stranger.id, 8, Money::from_major(3_000), 2).unwrap();

        let fetched = f.ledger.get_credit(a.id).unwrap();
        assert_eq!(fetched, a);
        assert_eq!(fetched.holder.id, 7);
        assert_eq!(fetched.account.id, f.account_id);
        assert_eq!(fetched.account.balance, Money::from_major(1_500));
        let dates: Vec<_> = fetched.payments.iter().map(|p| p.pay_date).collect();
        assert!(dates.windows(2).all(|w| w[0] > w[1]));

        let by_account = f.ledger.get_credits_by_account(other.id).unwrap();
        assert_eq!(by_account.iter().map(|c| c.id).collect::<Vec<_>>(), vec![b.id]);

        let by_user = f.ledger.get_credits_by_user(7).unwrap();
        assert_eq!(by_user.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a.id, b.id]);

        assert!(f.ledger.get_credits_by_user(99).unwrap().is_empty());
        assert_eq!(f.ledger.get_credit(404).unwrap_err(), CreditError::CreditNotFound { id: 404 });
    }

    #[test]
    fn test_concurrent_creation_has_single_winner() {
        let f = fixture();
        let ledger = f.ledger.clone();
        let account_id = f.account_id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.create_credit(account_id, 7, Money::from_major(1_000), 6))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(CreditError::ActiveCreditExists { .. })))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(f.store.credits().len(), 1);
        assert_eq!(f.store.account(account_id).unwrap().balance, Money::from_major(1_500));
    }
}
