use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hourglass_rs::SafeTimeProvider;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::instrument;

use crate::config::CreditConfig;
use crate::errors::Result;
use crate::payments::{PaymentProcessor, ScheduledOutcome};
use crate::store::Store;
use crate::types::PaymentId;

/// which scan a tick runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// planned payments whose pay date has passed
    Due,
    /// escalated payments awaiting funds
    Overdue,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Due => write!(f, "due"),
            Trigger::Overdue => write!(f, "overdue"),
        }
    }
}

/// counts of what one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub paid: usize,
    pub escalated: usize,
    pub skipped: usize,
    pub settled: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn processed(&self) -> usize {
        self.paid + self.escalated + self.skipped + self.failed
    }

    fn record(&mut self, outcome: ScheduledOutcome) {
        match outcome {
            ScheduledOutcome::Paid { settled, .. } => {
                self.paid += 1;
                if settled {
                    self.settled += 1;
                }
            }
            ScheduledOutcome::Escalated { .. } => self.escalated += 1,
            ScheduledOutcome::Deferred | ScheduledOutcome::Resolved => self.skipped += 1,
        }
    }
}

/// periodic collection of due and overdue installments
pub struct PaymentScheduler<S> {
    store: Arc<S>,
    processor: Arc<PaymentProcessor<S>>,
    time: Arc<SafeTimeProvider>,
    due_interval: Duration,
    overdue_interval: Duration,
}

impl<S: Store + 'static> PaymentScheduler<S> {
    pub fn new(
        store: Arc<S>,
        processor: Arc<PaymentProcessor<S>>,
        time: Arc<SafeTimeProvider>,
        config: &CreditConfig,
    ) -> Self {
        Self {
            store,
            processor,
            time,
            due_interval: config.due_tick_interval(),
            overdue_interval: config.overdue_tick_interval(),
        }
    }

    /// collect every planned payment due by now
    #[instrument(name = "credit.scheduler.due_tick", skip(self), err)]
    pub fn run_due_tick(&self) -> Result<TickReport> {
        let now = self.time.now();
        let due = self.store.atomically(|tx| tx.due_planned_payments(now))?;
        Ok(self.apply_batch(Trigger::Due, &due))
    }

    /// retry every escalated payment
    #[instrument(name = "credit.scheduler.overdue_tick", skip(self), err)]
    pub fn run_overdue_tick(&self) -> Result<TickReport> {
        let overdue = self.store.atomically(|tx| tx.overdue_payments())?;
        Ok(self.apply_batch(Trigger::Overdue, &overdue))
    }

    pub fn run(&self, trigger: Trigger) -> Result<TickReport> {
        match trigger {
            Trigger::Due => self.run_due_tick(),
            Trigger::Overdue => self.run_overdue_tick(),
        }
    }

    fn apply_batch(&self, trigger: Trigger, payments: &[PaymentId]) -> TickReport {
        let mut report = TickReport::default();

        for &payment_id in payments {
            match self.processor.apply_scheduled(payment_id) {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(%trigger, payment_id, error = %e, "Scheduled payment failed");
                }
            }
        }

        if !payments.is_empty() {
            tracing::info!(
                %trigger,
                paid = report.paid,
                escalated = report.escalated,
                skipped = report.skipped,
                settled = report.settled,
                failed = report.failed,
                "Scheduler tick finished"
            );
        }
        report
    }

    /// spawn both periodic loops on the current tokio runtime
    ///
    /// Each trigger first fires one full period after start. Must be called from within a
    /// runtime.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown, signal) = watch::channel(false);

        let tasks = vec![
            spawn_loop(Arc::clone(&self), Trigger::Due, self.due_interval, signal.clone()),
            spawn_loop(Arc::clone(&self), Trigger::Overdue, self.overdue_interval, signal),
        ];
        tracing::info!(
            due_secs = self.due_interval.as_secs(),
            overdue_secs = self.overdue_interval.as_secs(),
            "Payment scheduler started"
        );

        SchedulerHandle { shutdown, tasks }
    }
}

fn spawn_loop<S: Store + 'static>(
    scheduler: Arc<PaymentScheduler<S>>,
    trigger: Trigger,
    period: Duration,
    mut signal: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let worker = Arc::clone(&scheduler);
                    match task::spawn_blocking(move || worker.run(trigger)).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::error!(%trigger, error = %e, "Scheduler scan failed"),
                        Err(e) => tracing::error!(%trigger, error = %e, "Scheduler tick panicked"),
                    }
                }
                changed = signal.changed() => {
                    if changed.is_err() || *signal.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(%trigger, "Scheduler loop stopped");
    })
}

/// running scheduler loops
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// stop both loops, letting an in-flight tick finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Scheduler loop ended abnormally");
            }
        }
    }
}
