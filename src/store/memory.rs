use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::account::{Account, NewTransaction, TransactionRecord};
use crate::credit::{Credit, NewCredit, NewPayment, Payment};
use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::types::{
    AccountId, CreditId, CreditStatus, PaymentId, PaymentStatus, TransactionId, UserId,
};

use super::{Store, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    credits: BTreeMap<CreditId, Credit>,
    payments: BTreeMap<PaymentId, Payment>,
    transactions: Vec<TransactionRecord>,
    last_account_id: AccountId,
    last_credit_id: CreditId,
    last_payment_id: PaymentId,
    last_transaction_id: TransactionId,
}

/// store kept in process memory
///
/// A single lock serializes atomic units. Each unit mutates a private copy of the tables which
/// replaces the shared copy only on success, so a failed unit leaves no trace.
///
/// The copy covers every table, the transaction log included, so each unit costs time linear in
/// the size of the store and a scheduler batch of N payments costs N such copies. Suited to tests
/// and small embedded ledgers; a database-backed [`Store`] should be used beyond that.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_next_commit: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// make the next successful unit fail at commit time
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// open an account for a holder with a starting balance
    pub fn open_account(&self, holder_id: UserId, holder_email: &str, balance: Money) -> Account {
        let mut tables = self.tables.lock();
        tables.last_account_id += 1;
        let id = tables.last_account_id;
        let account = Account {
            id,
            number: format!("40817810{:012}", id),
            holder_id,
            holder_email: holder_email.to_string(),
            balance,
        };
        tables.accounts.insert(id, account.clone());
        account
    }

    /// overwrite an account balance, standing in for the external ledger
    pub fn set_balance(&self, account_id: AccountId, balance: Money) -> Result<()> {
        let mut tables = self.tables.lock();
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or(CreditError::AccountNotFound { id: account_id })?;
        account.balance = balance;
        Ok(())
    }

    /// whether an atomic unit or helper currently holds the tables
    pub fn is_locked(&self) -> bool {
        self.tables.is_locked()
    }

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.tables.lock().accounts.get(&id).cloned()
    }

    pub fn credit(&self, id: CreditId) -> Option<Credit> {
        self.tables.lock().credits.get(&id).cloned()
    }

    pub fn credits(&self) -> Vec<Credit> {
        self.tables.lock().credits.values().cloned().collect()
    }

    pub fn payments(&self, credit_id: CreditId) -> Vec<Payment> {
        let tables = self.tables.lock();
        sorted_payments(&tables, credit_id)
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.tables.lock().transactions.clone()
    }
}

impl Store for InMemoryStore {
    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T>,
    {
        let mut shared = self.tables.lock();
        let mut tx = MemoryTx {
            tables: shared.clone(),
        };

        let value = f(&mut tx)?;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(CreditError::StorageFailure {
                message: "commit rejected".to_string(),
            });
        }

        *shared = tx.tables;
        Ok(value)
    }
}

struct MemoryTx {
    tables: Tables,
}

fn sorted_payments(tables: &Tables, credit_id: CreditId) -> Vec<Payment> {
    let mut payments: Vec<Payment> = tables
        .payments
        .values()
        .filter(|p| p.credit_id == credit_id)
        .cloned()
        .collect();
    payments.sort_by_key(|p| (p.pay_date, p.id));
    payments
}

fn missing(table: &str, id: u64) -> CreditError {
    CreditError::StorageFailure {
        message: format!("{} row {} does not exist", table, id),
    }
}

impl StoreTx for MemoryTx {
    fn account(&mut self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.tables.accounts.get(&id).cloned())
    }

    fn save_account(&mut self, account: &Account) -> Result<()> {
        let row = self
            .tables
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| missing("account", account.id))?;
        *row = account.clone();
        Ok(())
    }

    fn accounts_for_holder(&mut self, holder_id: UserId) -> Result<Vec<Account>> {
        Ok(self
            .tables
            .accounts
            .values()
            .filter(|a| a.holder_id == holder_id)
            .cloned()
            .collect())
    }

    fn insert_credit(&mut self, new_credit: NewCredit) -> Result<Credit> {
        self.tables.last_credit_id += 1;
        let credit = Credit {
            id: self.tables.last_credit_id,
            account_id: new_credit.account_id,
            principal: new_credit.principal,
            rate: new_credit.rate,
            term_months: new_credit.term_months,
            start_date: new_credit.start_date,
            end_date: new_credit.end_date,
            status: CreditStatus::Active,
            created_at: new_credit.created_at,
        };
        self.tables.credits.insert(credit.id, credit.clone());
        Ok(credit)
    }

    fn credit(&mut self, id: CreditId) -> Result<Option<Credit>> {
        Ok(self.tables.credits.get(&id).cloned())
    }

    fn save_credit(&mut self, credit: &Credit) -> Result<()> {
        let row = self
            .tables
            .credits
            .get_mut(&credit.id)
            .ok_or_else(|| missing("credit", credit.id))?;
        *row = credit.clone();
        Ok(())
    }

    fn credits_for_account(&mut self, account_id: AccountId) -> Result<Vec<Credit>> {
        Ok(self
            .tables
            .credits
            .values()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect())
    }

    fn active_credit_for_account(&mut self, account_id: AccountId) -> Result<Option<Credit>> {
        Ok(self
            .tables
            .credits
            .values()
            .find(|c| c.account_id == account_id && c.status == CreditStatus::Active)
            .cloned())
    }

    fn insert_payments(&mut self, credit_id: CreditId, payments: Vec<NewPayment>) -> Result<Vec<Payment>> {
        if !self.tables.credits.contains_key(&credit_id) {
            return Err(missing("credit", credit_id));
        }

        let mut inserted = Vec::with_capacity(payments.len());
        for new_payment in payments {
            self.tables.last_payment_id += 1;
            let payment = new_payment.into_payment(self.tables.last_payment_id, credit_id);
            self.tables.payments.insert(payment.id, payment.clone());
            inserted.push(payment);
        }
        Ok(inserted)
    }

    fn payment(&mut self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.tables.payments.get(&id).cloned())
    }

    fn save_payment(&mut self, payment: &Payment) -> Result<()> {
        let row = self
            .tables
            .payments
            .get_mut(&payment.id)
            .ok_or_else(|| missing("payment", payment.id))?;
        *row = payment.clone();
        Ok(())
    }

    fn payments_for_credit(&mut self, credit_id: CreditId) -> Result<Vec<Payment>> {
        Ok(sorted_payments(&self.tables, credit_id))
    }

    fn next_planned_payment(&mut self, credit_id: CreditId) -> Result<Option<Payment>> {
        Ok(sorted_payments(&self.tables, credit_id)
            .into_iter()
            .find(|p| p.status == PaymentStatus::Planned))
    }

    fn count_unresolved_payments(&mut self, credit_id: CreditId) -> Result<usize> {
        Ok(self
            .tables
            .payments
            .values()
            .filter(|p| p.credit_id == credit_id && p.is_unresolved())
            .count())
    }

    fn due_planned_payments(&mut self, as_of: DateTime<Utc>) -> Result<Vec<PaymentId>> {
        let mut due: Vec<&Payment> = self
            .tables
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Planned && p.pay_date <= as_of)
            .collect();
        due.sort_by_key(|p| (p.pay_date, p.id));
        Ok(due.into_iter().map(|p| p.id).collect())
    }

    fn overdue_payments(&mut self) -> Result<Vec<PaymentId>> {
        let mut overdue: Vec<&Payment> = self
            .tables
            .payments
            .values()
            .filter(|p| p.is_overdue && p.status == PaymentStatus::Overdue)
            .collect();
        overdue.sort_by_key(|p| (p.pay_date, p.id));
        Ok(overdue.into_iter().map(|p| p.id).collect())
    }

    fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<TransactionRecord> {
        self.tables.last_transaction_id += 1;
        let record = transaction.into_record(self.tables.last_transaction_id);
        self.tables.transactions.push(record.clone());
        Ok(record)
    }

    fn transactions_for_account(&mut self, account_id: AccountId) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .tables
            .transactions
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect())
    }
}
