pub mod amortization;
pub mod penalty;
pub mod processor;

pub use amortization::{
    compute_annuity_payment, generate_schedule, AmortizationSchedule, ScheduledPayment,
    MAX_TERM_MONTHS,
};
pub use penalty::PenaltyPolicy;
pub use processor::{PaymentProcessor, ScheduledOutcome};
