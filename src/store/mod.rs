pub mod memory;

use chrono::{DateTime, Utc};

use crate::account::{Account, NewTransaction, TransactionRecord};
use crate::credit::{Credit, NewCredit, NewPayment, Payment};
use crate::errors::Result;
use crate::types::{AccountId, CreditId, PaymentId, UserId};

pub use memory::InMemoryStore;

/// row operations available inside one atomic unit
///
/// Every read observes the unit's own earlier writes. Nothing written through this trait is
/// visible to other units until the surrounding [`Store::atomically`] call returns `Ok`.
pub trait StoreTx {
    // accounts
    fn account(&mut self, id: AccountId) -> Result<Option<Account>>;
    fn save_account(&mut self, account: &Account) -> Result<()>;
    fn accounts_for_holder(&mut self, holder_id: UserId) -> Result<Vec<Account>>;

    // credits
    fn insert_credit(&mut self, new_credit: NewCredit) -> Result<Credit>;
    fn credit(&mut self, id: CreditId) -> Result<Option<Credit>>;
    fn save_credit(&mut self, credit: &Credit) -> Result<()>;
    /// all credits of an account, oldest first
    fn credits_for_account(&mut self, account_id: AccountId) -> Result<Vec<Credit>>;
    fn active_credit_for_account(&mut self, account_id: AccountId) -> Result<Option<Credit>>;

    // payments
    fn insert_payments(&mut self, credit_id: CreditId, payments: Vec<NewPayment>) -> Result<Vec<Payment>>;
    fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>>;
    fn save_payment(&mut self, payment: &Payment) -> Result<()>;
    /// payments of a credit by pay date ascending
    fn payments_for_credit(&mut self, credit_id: CreditId) -> Result<Vec<Payment>>;
    /// earliest PLANNED payment of a credit
    fn next_planned_payment(&mut self, credit_id: CreditId) -> Result<Option<Payment>>;
    /// PLANNED or OVERDUE payments left on a credit
    fn count_unresolved_payments(&mut self, credit_id: CreditId) -> Result<usize>;
    /// PLANNED payments with pay date at or before `as_of`, across all credits, by pay date
    fn due_planned_payments(&mut self, as_of: DateTime<Utc>) -> Result<Vec<PaymentId>>;
    /// payments flagged overdue that are still OVERDUE, by pay date
    fn overdue_payments(&mut self) -> Result<Vec<PaymentId>>;

    // transaction log
    fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<TransactionRecord>;
    fn transactions_for_account(&mut self, account_id: AccountId) -> Result<Vec<TransactionRecord>>;
}

/// persistent store with serializable atomic units
pub trait Store: Send + Sync {
    /// run `f` as one atomic unit
    ///
    /// Effects commit together when `f` returns `Ok`; on `Err` (from `f` or from the commit
    /// itself) none of them are observable.
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T>;
}
