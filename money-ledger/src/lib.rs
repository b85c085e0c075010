//! Money Ledger
//!
//! Account balances and an audit trail of transfers, served over
//! JSON-over-HTTP.
//!
//! # Architecture
//!
//! - **Atomic units**: debit, credit and the transaction record commit together
//! - **Pessimistic locking**: accounts are locked in id order, no deadlocks
//! - **Compare-and-swap**: a balance is only overwritten if it is still the one read
//! - **Audit trail**: every commit failure leaves a `failed` record
//!
//! # Invariants
//!
//! - Money conservation: transfers never change the sum of balances
//! - Non-negative balances
//! - Status moves only `pending → completed` or `pending → failed`

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod query;
pub mod rpc;
pub mod seed;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::TransferEngine;
pub use error::{Error, ErrorKind, Result};
pub use ledger::Ledger;
pub use query::QueryService;
pub use storage::Storage;
pub use types::{
    Account, AccountId, Currency, Transaction, TransactionId, TransactionStatus,
    TransferRequest,
};
