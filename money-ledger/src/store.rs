//! Storage contracts consumed by the transfer engine and query service
//!
//! Reads go straight to committed state. Every mutation the engine makes
//! happens inside a [`UnitOfWork`]: nothing it writes is visible until
//! [`UnitOfWork::commit`] succeeds, and dropping an uncommitted unit rolls
//! it back.

use crate::types::{Account, AccountId, Transaction, TransactionId, TransactionStatus};
use crate::Result;
use rust_decimal::Decimal;

/// Durable account records
pub trait AccountStore: Send + Sync {
    /// Point lookup; `NotFound` when absent
    fn get_account(&self, id: &AccountId) -> Result<Account>;

    /// Provision a new account; `AlreadyExists` on duplicate id or email
    fn create_account(&self, account: &Account) -> Result<()>;

    /// Every account, in id order
    fn list_accounts(&self) -> Result<Vec<Account>>;
}

/// Append-only transaction records
pub trait LedgerStore: Send + Sync {
    /// Point lookup; `NotFound` when absent
    fn get_transaction(&self, id: TransactionId) -> Result<Transaction>;

    /// Records where `account` is sender or receiver, newest first
    fn list_by_participant(
        &self,
        account: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    /// All records, newest first
    fn list_history(&self, limit: usize, offset: usize) -> Result<Vec<Transaction>>;
}

/// One atomic unit against the store
///
/// Rows read through `lock_*`/`find_*` stay exclusively locked until the
/// unit commits or is dropped.
pub trait UnitOfWork {
    /// Read an account and lock it for the rest of the unit
    fn lock_account(&mut self, id: &AccountId) -> Result<Option<Account>>;

    /// Compare-and-swap the balance: `Conflict` if it is no longer `expected`
    fn update_balance(&mut self, id: &AccountId, expected: Decimal, new: Decimal) -> Result<()>;

    /// Insert a new record; `AlreadyExists` if the id is taken
    fn insert_transaction(&mut self, record: &Transaction) -> Result<()>;

    /// Move a record along the status state machine
    fn update_status(&mut self, id: TransactionId, status: TransactionStatus)
        -> Result<Transaction>;

    /// Look up (and lock) the record stored under an idempotency key
    fn find_by_idempotency_key(&mut self, key: &str) -> Result<Option<Transaction>>;

    /// Make every write of the unit durable at once
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Full store: reads plus atomic units
pub trait Store: AccountStore + LedgerStore {
    /// Start an atomic unit
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>>;
}
