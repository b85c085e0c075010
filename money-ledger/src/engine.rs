//! Balance-transfer engine
//!
//! A transfer is validated in a fixed order and then executed as one unit
//! of work against the store:
//!
//! ```text
//! validate ids / amount
//!        │
//!        ▼
//! begin unit ── idempotency key? ──► replay original record
//!        │
//!        ▼
//! lock both accounts (lexicographic id order)
//!        │
//!        ▼
//! sender / receiver exist, balance ≥ amount
//!        │
//!        ▼
//! insert pending ─► debit ─► credit ─► completed ─► commit
//! ```
//!
//! Every write lands together at commit. A failure anywhere before commit
//! drops the unit, which rolls it back. Lock timeouts and write conflicts
//! are retried from the lock step (nothing was committed); a commit failure
//! is reported as `Internal` and leaves a separate `failed` audit record.

use crate::{
    config::TransferConfig,
    error::ErrorKind,
    metrics::Metrics,
    store::{Store, UnitOfWork},
    types::{
        parse_amount, Account, AccountId, Currency, Transaction, TransactionStatus,
        TransferRequest,
    },
    Error, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Transfer engine
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn Store>,
    config: TransferConfig,
    metrics: Metrics,
}

/// Request that passed the input checks
#[derive(Debug, Clone)]
struct ValidatedTransfer {
    from: AccountId,
    to: AccountId,
    amount: Decimal,
    currency: Currency,
    idempotency_key: Option<String>,
}

impl ValidatedTransfer {
    fn parse(request: &TransferRequest) -> Result<Self> {
        if request.from_account_id.is_empty() || request.to_account_id.is_empty() {
            return Err(Error::InvalidArgument(
                "account IDs cannot be empty".to_string(),
            ));
        }

        if request.from_account_id == request.to_account_id {
            return Err(Error::InvalidArgument(
                "cannot transfer money to the same account".to_string(),
            ));
        }

        let amount = parse_amount(&request.amount)?;

        Ok(Self {
            from: AccountId::new(request.from_account_id.as_str()),
            to: AccountId::new(request.to_account_id.as_str()),
            amount,
            currency: Currency::new(request.currency.as_str()),
            idempotency_key: request
                .idempotency_key
                .as_ref()
                .filter(|key| !key.is_empty())
                .cloned(),
        })
    }

    /// Same transfer as an earlier record stored under our key
    fn matches(&self, record: &Transaction) -> bool {
        record.from_account_id == self.from
            && record.to_account_id == self.to
            && record.amount == self.amount
            && record.currency == self.currency
    }
}

impl TransferEngine {
    /// Create engine over a store
    pub fn new(store: Arc<dyn Store>, config: TransferConfig, metrics: Metrics) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// Transfer with the configured default deadline
    pub async fn transfer(&self, request: TransferRequest) -> Result<Transaction> {
        self.transfer_with_timeout(request, self.config.default_timeout())
            .await
    }

    /// Transfer bounded by `timeout`
    ///
    /// The store work runs on the blocking pool. If the deadline fires while
    /// it is still running the outcome is ambiguous: the unit aborts if it
    /// has not reached commit yet, but it may already have committed. The
    /// caller must re-query (or resubmit with the same idempotency key)
    /// rather than blindly retry.
    pub async fn transfer_with_timeout(
        &self,
        request: TransferRequest,
        timeout: Duration,
    ) -> Result<Transaction> {
        let deadline = Instant::now() + timeout;
        let engine = self.clone();
        let task = tokio::task::spawn_blocking(move || engine.execute(&request, deadline));

        match tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Internal(format!(
                "transfer task failed: {}",
                join_error
            ))),
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Transfer deadline exceeded");
                Err(Error::DeadlineExceeded(
                    "transfer outcome unknown, re-query before retrying".to_string(),
                ))
            }
        }
    }

    /// Run a transfer on the current thread (blocking)
    pub fn execute(&self, request: &TransferRequest, deadline: Instant) -> Result<Transaction> {
        let started = Instant::now();
        let result = self.execute_inner(request, deadline);

        let outcome = match &result {
            Ok(record) => record.status.as_str(),
            Err(e) => e.kind().as_str(),
        };
        self.metrics
            .record_transfer(outcome, started.elapsed().as_secs_f64());

        result
    }

    fn execute_inner(&self, request: &TransferRequest, deadline: Instant) -> Result<Transaction> {
        let transfer = ValidatedTransfer::parse(request).map_err(|e| {
            debug!(error = %e, "Transfer rejected");
            e
        })?;

        let mut attempt = 0u32;
        loop {
            check_deadline(deadline)?;

            match self.run_unit(&transfer, deadline) {
                Err(Error::Conflict(reason)) if attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    self.metrics.record_conflict_retry();
                    warn!(
                        attempt,
                        from = %transfer.from,
                        to = %transfer.to,
                        reason = %reason,
                        "Transfer unit conflicted, retrying"
                    );
                    std::thread::sleep(self.config.backoff(attempt));
                }
                other => return other,
            }
        }
    }

    /// One attempt: a single unit of work from lock to commit
    fn run_unit(&self, transfer: &ValidatedTransfer, deadline: Instant) -> Result<Transaction> {
        let mut unit = self.store.begin().map_err(storage_failure)?;

        if let Some(key) = &transfer.idempotency_key {
            if let Some(existing) = unit
                .find_by_idempotency_key(key)
                .map_err(storage_failure)?
            {
                if !transfer.matches(&existing) {
                    return Err(Error::InvalidArgument(
                        "idempotency key reused with different transfer parameters".to_string(),
                    ));
                }
                info!(
                    transaction_id = %existing.id,
                    idempotency_key = %key,
                    "Replaying transfer for idempotency key"
                );
                return Ok(existing);
            }
        }

        let (sender, receiver) =
            lock_participants(&mut *unit, transfer).map_err(storage_failure)?;
        let sender = sender.ok_or_else(|| Error::NotFound("sender".to_string()))?;
        let receiver = receiver.ok_or_else(|| Error::NotFound("receiver".to_string()))?;

        if sender.balance < transfer.amount {
            debug!(
                from = %sender.id,
                balance = %sender.balance,
                amount = %transfer.amount,
                "Insufficient balance"
            );
            return Err(Error::FailedPrecondition(
                "insufficient balance".to_string(),
            ));
        }

        let record = Transaction::new(
            sender.id.clone(),
            receiver.id.clone(),
            transfer.amount,
            transfer.currency.clone(),
        )
        .with_idempotency_key(transfer.idempotency_key.clone());

        match apply_transfer(unit, &sender, &receiver, &record, deadline) {
            Ok(completed) => {
                info!(
                    transaction_id = %completed.id,
                    from = %completed.from_account_id,
                    to = %completed.to_account_id,
                    amount = %completed.amount,
                    currency = %completed.currency,
                    "Transfer completed"
                );
                Ok(completed)
            }
            Err(e @ (Error::Conflict(_) | Error::DeadlineExceeded(_))) => Err(e),
            Err(e) => {
                error!(
                    transaction_id = %record.id,
                    error = %e,
                    "Transfer commit failed, rolled back"
                );
                self.record_failed_attempt(record);
                Err(Error::Internal(format!("failed to commit transfer: {}", e)))
            }
        }
    }

    /// Persist a `failed` audit record for an attempt whose unit rolled back
    ///
    /// The record carries no idempotency key so a retry under the same key
    /// executes again instead of replaying the failure.
    fn record_failed_attempt(&self, mut record: Transaction) {
        record.idempotency_key = None;

        let result = (|| -> Result<Transaction> {
            let mut unit = self.store.begin()?;
            unit.insert_transaction(&record)?;
            let failed = unit.update_status(record.id, TransactionStatus::Failed)?;
            unit.commit()?;
            Ok(failed)
        })();

        match result {
            Ok(failed) => {
                self.metrics.record_failed_record();
                warn!(transaction_id = %failed.id, "Recorded failed transfer attempt");
            }
            Err(e) => {
                error!(
                    transaction_id = %record.id,
                    error = %e,
                    "Could not record failed transfer attempt"
                );
            }
        }
    }
}

/// Lock sender and receiver in lexicographic id order, so two transfers
/// over the same pair in opposite directions queue instead of deadlocking
fn lock_participants(
    unit: &mut (dyn UnitOfWork + '_),
    transfer: &ValidatedTransfer,
) -> Result<(Option<Account>, Option<Account>)> {
    if transfer.from <= transfer.to {
        let sender = unit.lock_account(&transfer.from)?;
        let receiver = unit.lock_account(&transfer.to)?;
        Ok((sender, receiver))
    } else {
        let receiver = unit.lock_account(&transfer.to)?;
        let sender = unit.lock_account(&transfer.from)?;
        Ok((sender, receiver))
    }
}

/// Insert, debit, credit, complete, commit. Consumes the unit: on error it
/// is dropped and rolled back.
fn apply_transfer(
    mut unit: Box<dyn UnitOfWork + '_>,
    sender: &Account,
    receiver: &Account,
    record: &Transaction,
    deadline: Instant,
) -> Result<Transaction> {
    let new_sender_balance = sender
        .balance
        .checked_sub(record.amount)
        .filter(|balance| *balance >= Decimal::ZERO)
        .ok_or_else(|| Error::Internal(format!("debit of {} out of range", sender.id)))?;
    let new_receiver_balance = receiver
        .balance
        .checked_add(record.amount)
        .ok_or_else(|| Error::Internal(format!("credit of {} overflows", receiver.id)))?;

    unit.insert_transaction(record)?;
    unit.update_balance(&sender.id, sender.balance, new_sender_balance)?;
    unit.update_balance(&receiver.id, receiver.balance, new_receiver_balance)?;
    let completed = unit.update_status(record.id, TransactionStatus::Completed)?;

    // Last point where aborting leaves no trace
    check_deadline(deadline)?;
    unit.commit()?;

    Ok(completed)
}

fn check_deadline(deadline: Instant) -> Result<()> {
    if Instant::now() >= deadline {
        return Err(Error::DeadlineExceeded(
            "deadline passed before commit, transfer aborted".to_string(),
        ));
    }
    Ok(())
}

/// Storage trouble before any write: keep conflicts retryable, report the
/// rest as internal
fn storage_failure(e: Error) -> Error {
    match e.kind() {
        ErrorKind::Internal => Error::Internal(format!("storage failure: {}", e)),
        _ => e,
    }
}
