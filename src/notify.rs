use parking_lot::Mutex;
use thiserror::Error;

use crate::types::CreditId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification failed: {message}")]
pub struct NotifyError {
    pub message: String,
}

/// best-effort delivery of borrower notifications
pub trait Notifier: Send + Sync {
    fn notify_credit_paid_off(&self, holder_email: &str, credit_id: CreditId) -> Result<(), NotifyError>;
}

/// writes notifications to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_credit_paid_off(&self, holder_email: &str, credit_id: CreditId) -> Result<(), NotifyError> {
        tracing::info!(
            credit_id,
            holder_email,
            "Credit #{} has been paid off",
            credit_id
        );
        Ok(())
    }
}

/// records notifications for assertions; can be told to fail
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, CreditId)>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn sent(&self) -> Vec<(String, CreditId)> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_credit_paid_off(&self, holder_email: &str, credit_id: CreditId) -> Result<(), NotifyError> {
        if *self.failing.lock() {
            return Err(NotifyError {
                message: format!("smtp unavailable for {}", holder_email),
            });
        }
        self.sent.lock().push((holder_email.to_string(), credit_id));
        Ok(())
    }
}
