pub mod account;
pub mod config;
pub mod credit;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod notify;
pub mod payments;
pub mod rates;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use account::{Account, TransactionRecord};
pub use config::CreditConfig;
pub use credit::{Credit, Payment};
pub use decimal::{Money, Rate};
pub use engine::CreditEngine;
pub use errors::{CreditError, ErrorKind, Result};
pub use ledger::CreditLedger;
pub use notify::{Notifier, NotifyError, RecordingNotifier, TracingNotifier};
pub use payments::{
    compute_annuity_payment, generate_schedule, AmortizationSchedule, PaymentProcessor, PenaltyPolicy,
    ScheduledOutcome, ScheduledPayment, MAX_TERM_MONTHS,
};
pub use rates::{FixedRateSource, MockRateSource, RateSource};
pub use scheduler::{PaymentScheduler, SchedulerHandle, TickReport, Trigger};
pub use store::{InMemoryStore, Store, StoreTx};
pub use types::{
    AccountId, CreditId, CreditStatus, PaymentId, PaymentStatus, TransactionId, TransactionKind,
    UserId,
};
pub use views::{AccountView, CreditView, HolderView, PaymentView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
