//! Wire messages
//!
//! Domain types never cross the transport boundary directly: every message
//! here is built through an explicit mapping.

use crate::types::{Account, Transaction, TransferRequest};
use serde::{Deserialize, Serialize};

/// `POST /v1/transfers` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequestMessage {
    /// Sender account ID
    #[serde(default)]
    pub from_account_id: String,
    /// Receiver account ID
    #[serde(default)]
    pub to_account_id: String,
    /// Decimal amount as text
    #[serde(default)]
    pub amount: String,
    /// Currency code
    #[serde(default)]
    pub currency: String,
    /// Optional deduplication key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Caller deadline (milliseconds), server default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl From<TransferRequestMessage> for TransferRequest {
    fn from(message: TransferRequestMessage) -> Self {
        Self {
            from_account_id: message.from_account_id,
            to_account_id: message.to_account_id,
            amount: message.amount,
            currency: message.currency,
            idempotency_key: message.idempotency_key,
        }
    }
}

/// Transaction record on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMessage {
    pub id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount: String,
    pub currency: String,
    pub status: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl From<&Transaction> for TransactionMessage {
    fn from(record: &Transaction) -> Self {
        Self {
            id: record.id.to_string(),
            from_account_id: record.from_account_id.to_string(),
            to_account_id: record.to_account_id.to_string(),
            amount: record.amount.to_string(),
            currency: record.currency.code().to_string(),
            status: record.status.as_str().to_string(),
            created_at: record.created_at.to_rfc3339(),
            idempotency_key: record.idempotency_key.clone(),
        }
    }
}

/// Account on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub balance: String,
    pub created_at: String,
}

impl From<&Account> for AccountMessage {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.clone(),
            email: account.email.clone(),
            balance: account.balance.to_string(),
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// One page of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<TransactionMessage>,
    pub limit: usize,
    pub offset: usize,
}

impl TransactionPage {
    /// Map a page of domain records
    pub fn new(records: &[Transaction], limit: usize, offset: usize) -> Self {
        Self {
            transactions: records.iter().map(TransactionMessage::from).collect(),
            limit,
            offset,
        }
    }
}

/// Error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Machine-readable kind, e.g. `NOT_FOUND`
    pub kind: String,
    /// Human-readable detail
    pub message: String,
}

/// `?limit&offset` query string
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMessage {
    pub status: String,
    pub service: String,
    pub version: String,
}
