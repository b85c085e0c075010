//! Read-only lookups over committed state

use crate::{
    config::QueryConfig,
    store::{AccountStore, LedgerStore, Store},
    types::{Account, AccountId, Transaction, TransactionId},
    Error, Result,
};
use std::sync::Arc;
use tracing::debug;

/// Query service
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn Store>,
    config: QueryConfig,
}

impl QueryService {
    /// Create query service over a store
    pub fn new(store: Arc<dyn Store>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Fetch one account
    pub async fn get_account(&self, id: &str) -> Result<Account> {
        let id = parse_account_id(id)?;
        self.run(move |store| store.get_account(&id)).await
    }

    /// Fetch one transaction record by its textual id
    ///
    /// An id that can never name a record is reported as `NotFound`.
    pub async fn get_transaction(&self, id: &str) -> Result<Transaction> {
        if id.is_empty() {
            return Err(Error::InvalidArgument(
                "transaction ID cannot be empty".to_string(),
            ));
        }
        let id = TransactionId::parse(id)
            .map_err(|_| Error::NotFound("transaction".to_string()))?;
        self.run(move |store| store.get_transaction(id)).await
    }

    /// Records where `account` is sender or receiver, newest first
    ///
    /// `NotFound` when the account does not exist, so an unknown id is not
    /// confused with an account that simply has no history.
    pub async fn list_transactions_for_account(
        &self,
        account: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let id = parse_account_id(account)?;
        let limit = self.clamp(limit);
        self.run(move |store| {
            store.get_account(&id)?;
            store.list_by_participant(&id, limit, offset)
        })
        .await
    }

    /// Every record, newest first
    pub async fn list_transaction_history(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let limit = self.clamp(limit);
        self.run(move |store| store.list_history(limit, offset)).await
    }

    /// Page size after applying the configured cap
    pub fn clamp(&self, limit: usize) -> usize {
        limit.min(self.config.max_page_size)
    }

    /// Page size used when the caller sends none
    pub fn default_page_size(&self) -> usize {
        self.config.default_page_size
    }

    async fn run<T, F>(&self, read: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        let task = tokio::task::spawn_blocking(move || read(store.as_ref()));

        match tokio::time::timeout(self.config.timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Internal(format!(
                "query task failed: {}",
                join_error
            ))),
            Err(_) => {
                debug!(timeout_ms = self.config.timeout_ms, "Query timed out");
                Err(Error::DeadlineExceeded("query timed out".to_string()))
            }
        }
    }
}

fn parse_account_id(id: &str) -> Result<AccountId> {
    if id.is_empty() {
        return Err(Error::InvalidArgument(
            "account ID cannot be empty".to_string(),
        ));
    }
    Ok(AccountId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::UnitOfWork;
    use crate::types::{Currency, TransactionStatus};
    use crate::{Config, Storage};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn service(max_page_size: usize) -> (QueryService, Arc<Storage>, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();
        config.rocksdb.sync_writes = false;
        config.query.max_page_size = max_page_size;

        let storage = Arc::new(Storage::open(&config).unwrap());
        let query = QueryService::new(storage.clone(), config.query.clone());
        (query, storage, temp)
    }

    fn account(storage: &Storage, id: &str) {
        let account = Account::new(id, format!("{id}@example.com"), Decimal::new(100, 0))
            .with_id(AccountId::new(id));
        storage.create_account(&account).unwrap();
    }

    fn record(storage: &Storage, from: &str, to: &str) -> Transaction {
        let mut unit = storage.begin().unwrap();
        let record = Transaction::new(
            AccountId::new(from),
            AccountId::new(to),
            Decimal::ONE,
            Currency::new("USD"),
        );
        unit.insert_transaction(&record).unwrap();
        let completed = unit
            .update_status(record.id, TransactionStatus::Completed)
            .unwrap();
        unit.commit().unwrap();
        completed
    }

    #[tokio::test]
    async fn test_get_account() {
        let (query, storage, _temp) = service(500);
        account(&storage, "alice");

        let found = query.get_account("alice").await.unwrap();
        assert_eq!(found.email, "alice@example.com");

        let err = query.get_account("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = query.get_account("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_get_transaction() {
        let (query, storage, _temp) = service(500);
        let stored = record(&storage, "a", "b");

        let found = query.get_transaction(&stored.id.to_string()).await.unwrap();
        assert_eq!(found, stored);

        let err = query.get_transaction("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = query.get_transaction("not-a-uuid").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let missing = TransactionId::new().to_string();
        let err = query.get_transaction(&missing).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_for_account() {
        let (query, storage, _temp) = service(500);
        account(&storage, "alice");
        account(&storage, "bob");
        account(&storage, "carol");

        let first = record(&storage, "alice", "bob");
        let second = record(&storage, "bob", "carol");
        record(&storage, "carol", "carol-2");

        let bob = query.list_transactions_for_account("bob", 10, 0).await.unwrap();
        assert_eq!(
            bob.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let empty = query.list_transactions_for_account("bob", 0, 0).await.unwrap();
        assert!(empty.is_empty());

        let past_end = query.list_transactions_for_account("bob", 10, 5).await.unwrap();
        assert!(past_end.is_empty());

        let err = query
            .list_transactions_for_account("ghost", 10, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_history_limit_is_clamped() {
        let (query, storage, _temp) = service(2);
        for _ in 0..5 {
            record(&storage, "a", "b");
        }

        let page = query.list_transaction_history(100, 0).await.unwrap();
        assert_eq!(page.len(), 2);

        let all = query.list_transaction_history(2, 4).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
