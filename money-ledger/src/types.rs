//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - No wire-format concerns (mapping lives in [`crate::rpc::dto`])

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Opaque account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random ID (UUIDv4 text)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier carries no characters
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Transaction identifier (UUIDv7, so ids sort by creation time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Allocate a new time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from text, rejecting anything that is not a UUID
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::InvalidArgument(
                "transaction ID cannot be empty".to_string(),
            ));
        }
        Uuid::parse_str(text)
            .map(Self)
            .map_err(|_| Error::InvalidArgument(format!("malformed transaction ID: {text}")))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Rebuild from key bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency code, carried through untouched (no conversion logic)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create new currency code
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Code as text
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account holding a balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: AccountId,

    /// Display name
    pub name: String,

    /// Contact email (unique across accounts)
    pub email: String,

    /// Current balance (exact decimal)
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// New account with a generated ID
    pub fn new(name: impl Into<String>, email: impl Into<String>, balance: Decimal) -> Self {
        Self {
            id: AccountId::generate(),
            name: name.into(),
            email: email.into(),
            balance,
            created_at: Utc::now(),
        }
    }

    /// Same account with a caller-chosen ID
    pub fn with_id(mut self, id: AccountId) -> Self {
        self.id = id;
        self
    }
}

/// Transaction status
///
/// ```text
/// pending ──► completed
///    │
///    └─────► failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionStatus {
    /// Accepted, not yet committed
    Pending = 1,
    /// Debit, credit and record committed (terminal)
    Completed = 2,
    /// Validation passed but the commit failed (terminal)
    Failed = 3,
}

impl TransactionStatus {
    /// Lowercase status name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    /// Allowed edges of the state machine
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(Error::InvalidArgument(format!("unknown status: {other}"))),
        }
    }
}

/// Ledger entry: immutable audit record of one transfer attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID
    pub id: TransactionId,

    /// Sender account
    pub from_account_id: AccountId,

    /// Receiver account
    pub to_account_id: AccountId,

    /// Amount moved (strictly positive)
    pub amount: Decimal,

    /// Currency code
    pub currency: Currency,

    /// Current status
    pub status: TransactionStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Caller-supplied deduplication key
    pub idempotency_key: Option<String>,
}

impl Transaction {
    /// New `pending` record stamped with the current time
    pub fn new(
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            from_account_id,
            to_account_id,
            amount,
            currency,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            idempotency_key: None,
        }
    }

    /// Attach an idempotency key
    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Move to `next`, enforcing the state machine
    pub fn transition(&mut self, next: TransactionStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Whether `account` is the sender or the receiver
    pub fn involves(&self, account: &AccountId) -> bool {
        &self.from_account_id == account || &self.to_account_id == account
    }

    /// Nanoseconds since Unix epoch, used for index ordering
    pub fn created_at_nanos(&self) -> i64 {
        self.created_at.timestamp_nanos_opt().unwrap_or(0)
    }
}

/// Inbound transfer request, still untrusted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Sender account ID
    pub from_account_id: String,
    /// Receiver account ID
    pub to_account_id: String,
    /// Decimal amount as text
    pub amount: String,
    /// Currency code
    pub currency: String,
    /// Optional deduplication key
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    /// Request without an idempotency key
    pub fn new(
        from_account_id: impl Into<String>,
        to_account_id: impl Into<String>,
        amount: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            from_account_id: from_account_id.into(),
            to_account_id: to_account_id.into(),
            amount: amount.into(),
            currency: currency.into(),
            idempotency_key: None,
        }
    }

    /// Attach an idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Parse a strictly positive decimal amount
pub fn parse_amount(text: &str) -> Result<Decimal> {
    let amount = Decimal::from_str(text)
        .map_err(|_| Error::InvalidArgument(format!("invalid amount: {text:?}")))?;

    if amount <= Decimal::ZERO {
        return Err(Error::InvalidArgument(
            "amount must be positive".to_string(),
        ));
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transaction() -> Transaction {
        Transaction::new(
            AccountId::new("alice"),
            AccountId::new("bob"),
            Decimal::new(25000, 2),
            Currency::new("USD"),
        )
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("250.00").unwrap(), Decimal::new(25000, 2));
        assert_eq!(parse_amount("0.01").unwrap(), Decimal::new(1, 2));
        assert!(matches!(parse_amount("0"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_amount("-5"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_amount(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_amount("ten"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_amount("1.5.0"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_decimal_round_trip_keeps_scale() {
        let parsed = parse_amount("1000.00").unwrap();
        let text = parsed.to_string();
        assert_eq!(text, "1000.00");

        let reparsed = parse_amount(&text).unwrap();
        assert_eq!(reparsed, parsed);
        assert_eq!(reparsed.scale(), 2);
    }

    #[test]
    fn test_status_transitions() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));

        assert!(!Pending.is_terminal());
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
    }

    #[test]
    fn test_transition_applies_once() {
        let mut tx = sample_transaction();
        assert_eq!(tx.status, TransactionStatus::Pending);

        tx.transition(TransactionStatus::Completed).unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);

        let err = tx.transition(TransactionStatus::Failed).unwrap_err();
        assert_eq!(err.to_string(), "Invalid status transition: completed -> failed");
        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "completed".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Completed
        );
        assert!("settled".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_transaction_id_parse() {
        let id = TransactionId::new();
        assert_eq!(TransactionId::parse(&id.to_string()).unwrap(), id);
        assert!(matches!(
            TransactionId::parse(""),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            TransactionId::parse("not-a-uuid"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_transaction_involves() {
        let tx = sample_transaction();
        assert!(tx.involves(&AccountId::new("alice")));
        assert!(tx.involves(&AccountId::new("bob")));
        assert!(!tx.involves(&AccountId::new("carol")));
    }

    #[test]
    fn test_bincode_round_trip_preserves_decimal() {
        let tx = sample_transaction().with_idempotency_key(Some("key-1".into()));
        let bytes = bincode::serialize(&tx).unwrap();
        let decoded: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.amount.to_string(), "250.00");
    }
}
