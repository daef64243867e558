use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;

use crate::config::CreditConfig;
use crate::decimal::Money;
use crate::errors::Result;
use crate::ledger::CreditLedger;
use crate::notify::Notifier;
use crate::payments::PaymentProcessor;
use crate::rates::RateSource;
use crate::scheduler::PaymentScheduler;
use crate::store::Store;
use crate::types::{AccountId, CreditId, UserId};
use crate::views::{CreditView, PaymentView};

/// the wired credit lifecycle: issuance, repayment and scheduled collection
pub struct CreditEngine<S> {
    ledger: CreditLedger<S>,
    processor: Arc<PaymentProcessor<S>>,
    scheduler: Arc<PaymentScheduler<S>>,
}

impl<S: Store + 'static> CreditEngine<S> {
    /// wire the services around one store, validating `config` first
    pub fn new(
        store: Arc<S>,
        rates: Arc<dyn RateSource>,
        notifier: Arc<dyn Notifier>,
        time: Arc<SafeTimeProvider>,
        config: &CreditConfig,
    ) -> Result<Self> {
        config.validate()?;

        let ledger = CreditLedger::new(Arc::clone(&store), rates, Arc::clone(&time));
        let processor = Arc::new(
            PaymentProcessor::new(
                Arc::clone(&store),
                notifier,
                Arc::clone(&time),
                config.penalty_policy()?,
            )
            .with_scheduled_payoff(config.settle_on_scheduled_payoff),
        );
        let scheduler = Arc::new(PaymentScheduler::new(
            store,
            Arc::clone(&processor),
            time,
            config,
        ));

        Ok(Self {
            ledger,
            processor,
            scheduler,
        })
    }

    pub fn create_credit(
        &self,
        account_id: AccountId,
        requester_id: UserId,
        amount: Money,
        term_months: i32,
    ) -> Result<CreditView> {
        self.ledger.create_credit(account_id, requester_id, amount, term_months)
    }

    pub fn get_credit(&self, id: CreditId) -> Result<CreditView> {
        self.ledger.get_credit(id)
    }

    pub fn get_credits_by_account(&self, account_id: AccountId) -> Result<Vec<CreditView>> {
        self.ledger.get_credits_by_account(account_id)
    }

    pub fn get_credits_by_user(&self, user_id: UserId) -> Result<Vec<CreditView>> {
        self.ledger.get_credits_by_user(user_id)
    }

    pub fn pay_credit(
        &self,
        credit_id: CreditId,
        account_id: AccountId,
        amount: Money,
    ) -> Result<PaymentView> {
        self.processor.pay_credit(credit_id, account_id, amount)
    }

    pub fn ledger(&self) -> &CreditLedger<S> {
        &self.ledger
    }

    pub fn processor(&self) -> &Arc<PaymentProcessor<S>> {
        &self.processor
    }

    pub fn scheduler(&self) -> &Arc<PaymentScheduler<S>> {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    use crate::decimal::Rate;
    use crate::errors::{CreditError, ErrorKind};
    use crate::notify::RecordingNotifier;
    use crate::rates::MockRateSource;
    use crate::store::InMemoryStore;
    use crate::types::{CreditStatus, PaymentStatus};

    #[test]
    fn test_rejects_invalid_configuration() {
        let config = CreditConfig {
            penalty_percentage: dec!(-1),
            ..CreditConfig::default()
        };
        let result = CreditEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockRateSource::new(Rate::from_percentage(12))),
            Arc::new(RecordingNotifier::new()),
            Arc::new(SafeTimeProvider::new(TimeSource::System)),
            &config,
        );

        assert!(matches!(result, Err(CreditError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_credit_lifecycle() {
        let store = Arc::new(InMemoryStore::new());
        let rates = Arc::new(MockRateSource::new(Rate::from_percentage(12)));
        let notifier = Arc::new(RecordingNotifier::new());
        let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        )));
        let engine = CreditEngine::new(
            Arc::clone(&store),
            rates.clone(),
            notifier.clone(),
            Arc::clone(&time),
            &CreditConfig::default(),
        )
        .unwrap();

        let account = store.open_account(42, "holder@example.com", Money::ZERO);
        let credit = engine.create_credit(account.id, 42, Money::from_major(120_000), 12).unwrap();
        assert_eq!(credit.payments.len(), 12);
        assert_eq!(credit.next_payment.as_ref().unwrap().amount, Money::from_str_exact("10661.85").unwrap());

        // the rate feed only matters at issuance
        rates.set_rate(None);

        // first installment paid by hand, the rest by the scheduler
        let first = engine.pay_credit(credit.id, account.id, Money::from_major(10_700)).unwrap();
        assert_eq!(first.status, PaymentStatus::Paid);

        store.set_balance(account.id, Money::from_major(200_000)).unwrap();
        time.test_control().unwrap().advance(Duration::days(366));
        let report = engine.scheduler().run_due_tick().unwrap();
        assert_eq!(report.paid, 11);
        assert_eq!(report.settled, 1);

        let settled = engine.get_credit(credit.id).unwrap();
        assert_eq!(settled.status, CreditStatus::Paid);
        assert_eq!(settled.remaining_amount, Money::ZERO);
        assert!(settled.next_payment.is_none());
        assert_eq!(notifier.sent().len(), 1);

        assert_eq!(engine.get_credits_by_user(42).unwrap().len(), 1);
        assert_eq!(engine.get_credits_by_account(account.id).unwrap()[0].id, credit.id);

        // a fresh credit now needs the rate feed again
        let err = engine.create_credit(account.id, 42, Money::from_major(1_000), 6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateUnavailable);
    }
}
