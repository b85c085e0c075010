//! Storage layer using RocksDB
//!
//! Opened as a pessimistic `TransactionDB`: every unit of work holds row
//! locks taken with `get_for_update` until it commits or is dropped, and a
//! commit lands all of its writes at once.
//!
//! # Column Families
//!
//! - `accounts` - Account records (key: account_id)
//! - `emails` - Unique email index (key: lowercased email → account_id)
//! - `transactions` - Transaction records (key: transaction_id)
//! - `indices` - Ordering indices for participant and history scans
//! - `idempotency` - Idempotency keys (key → transaction_id)

use crate::{
    error::{Error, Result},
    store::{AccountStore, LedgerStore, Store, UnitOfWork},
    types::{Account, AccountId, Transaction, TransactionId, TransactionStatus},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, TransactionDB,
    TransactionDBOptions, TransactionOptions, WriteOptions,
};
use rust_decimal::Decimal;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_EMAILS: &str = "emails";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INDICES: &str = "indices";
const CF_IDEMPOTENCY: &str = "idempotency";

/// Index key tags
const TAG_PARTICIPANT: u8 = b'p';
const TAG_HISTORY: u8 = b'h';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: TransactionDB,
    lock_timeout_ms: i64,
    sync_writes: bool,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(config.rocksdb.lock_timeout_ms);
        txn_db_opts.set_default_lock_timeout(config.rocksdb.lock_timeout_ms);

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_point_lookup()),
            ColumnFamilyDescriptor::new(CF_EMAILS, Self::cf_options_point_lookup()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Self::cf_options_point_lookup()),
        ];

        // Open database
        let db: TransactionDB =
            TransactionDB::open_cf_descriptors(&db_opts, &txn_db_opts, path, cf_descriptors)?;

        tracing::info!(
            path = ?path,
            lock_timeout_ms = config.rocksdb.lock_timeout_ms,
            "Opened RocksDB transaction store"
        );

        Ok(Self {
            db,
            lock_timeout_ms: config.rocksdb.lock_timeout_ms,
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_point_lookup() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Scan an index prefix, skipping `offset` entries and resolving up to
    /// `limit` transaction records
    fn scan_index(&self, prefix: &[u8], limit: usize, offset: usize) -> Result<Vec<Transaction>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let iter = self
            .db
            .iterator_cf(cf_indices, IteratorMode::From(prefix, Direction::Forward));

        let mut skipped = 0usize;
        let mut records = Vec::with_capacity(limit.min(64));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }

            let id = Self::transaction_id_from_index_key(&key)?;
            records.push(self.get_transaction(id)?);
            if records.len() == limit {
                break;
            }
        }

        Ok(records)
    }

    // Index key helpers

    /// Newest first: invert the timestamp so ascending key order is
    /// descending creation order
    fn inverted_nanos(record: &Transaction) -> [u8; 8] {
        let nanos = record.created_at_nanos().max(0) as u64;
        (u64::MAX - nanos).to_be_bytes()
    }

    fn index_prefix_participant(account: &AccountId) -> Vec<u8> {
        let id = account.as_str().as_bytes();
        let mut key = Vec::with_capacity(5 + id.len() + 24);
        key.push(TAG_PARTICIPANT);
        // Length prefix keeps "ab" from matching the scan for "a"
        key.extend_from_slice(&(id.len() as u32).to_be_bytes());
        key.extend_from_slice(id);
        key
    }

    fn index_key_participant(account: &AccountId, record: &Transaction) -> Vec<u8> {
        let mut key = Self::index_prefix_participant(account);
        key.extend_from_slice(&Self::inverted_nanos(record));
        key.extend_from_slice(record.id.as_bytes());
        key
    }

    fn index_key_history(record: &Transaction) -> Vec<u8> {
        let mut key = Vec::with_capacity(25);
        key.push(TAG_HISTORY);
        key.extend_from_slice(&Self::inverted_nanos(record));
        key.extend_from_slice(record.id.as_bytes());
        key
    }

    fn transaction_id_from_index_key(key: &[u8]) -> Result<TransactionId> {
        if key.len() < 16 {
            return Err(Error::Storage("Corrupt index key".to_string()));
        }
        let bytes: [u8; 16] = key[key.len() - 16..]
            .try_into()
            .map_err(|_| Error::Storage("Corrupt index key".to_string()))?;
        Ok(TransactionId::from_bytes(bytes))
    }

    fn email_key(email: &str) -> Vec<u8> {
        email.trim().to_ascii_lowercase().into_bytes()
    }

    /// Start a unit with the configured lock timeout and durability
    fn begin_unit(&self) -> RocksUnit<'_> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);

        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(self.lock_timeout_ms);

        RocksUnit {
            storage: self,
            txn: self.db.transaction_opt(&write_opts, &txn_opts),
        }
    }
}

impl AccountStore for Storage {
    fn get_account(&self, id: &AccountId) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let value = self
            .db
            .get_cf(cf, id.as_str().as_bytes())?
            .ok_or_else(|| Error::NotFound("account".to_string()))?;

        let account: Account = bincode::deserialize(&value)?;
        Ok(account)
    }

    fn create_account(&self, account: &Account) -> Result<()> {
        if account.id.is_empty() {
            return Err(Error::InvalidArgument(
                "account ID cannot be empty".to_string(),
            ));
        }

        let unit = self.begin_unit();
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_emails = self.cf_handle(CF_EMAILS)?;

        let id_key = account.id.as_str().as_bytes();
        let email_key = Self::email_key(&account.email);

        if unit.txn.get_for_update_cf(cf_accounts, id_key, true)?.is_some() {
            return Err(Error::AlreadyExists(format!("account {}", account.id)));
        }
        if unit.txn.get_for_update_cf(cf_emails, &email_key, true)?.is_some() {
            return Err(Error::AlreadyExists(format!("email {}", account.email)));
        }

        unit.txn.put_cf(cf_accounts, id_key, bincode::serialize(account)?)?;
        unit.txn.put_cf(cf_emails, &email_key, id_key)?;
        unit.txn.commit()?;

        tracing::debug!(account_id = %account.id, "Account created");
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }

        Ok(accounts)
    }
}

impl LedgerStore for Storage {
    fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let value = self
            .db
            .get_cf(cf, id.as_bytes())?
            .ok_or_else(|| Error::NotFound("transaction".to_string()))?;

        let record: Transaction = bincode::deserialize(&value)?;
        Ok(record)
    }

    fn list_by_participant(
        &self,
        account: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        self.scan_index(&Self::index_prefix_participant(account), limit, offset)
    }

    fn list_history(&self, limit: usize, offset: usize) -> Result<Vec<Transaction>> {
        self.scan_index(&[TAG_HISTORY], limit, offset)
    }
}

impl Store for Storage {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>> {
        Ok(Box::new(self.begin_unit()))
    }
}

/// RocksDB-backed unit of work
///
/// Dropping the unit without committing rolls back every write and
/// releases its locks.
pub struct RocksUnit<'a> {
    storage: &'a Storage,
    txn: rocksdb::Transaction<'a, TransactionDB>,
}

impl RocksUnit<'_> {
    fn locked_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let cf = self.storage.cf_handle(CF_TRANSACTIONS)?;
        match self.txn.get_for_update_cf(cf, id.as_bytes(), true)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl UnitOfWork for RocksUnit<'_> {
    fn lock_account(&mut self, id: &AccountId) -> Result<Option<Account>> {
        let cf = self.storage.cf_handle(CF_ACCOUNTS)?;
        match self.txn.get_for_update_cf(cf, id.as_str().as_bytes(), true)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn update_balance(&mut self, id: &AccountId, expected: Decimal, new: Decimal) -> Result<()> {
        let mut account = self
            .lock_account(id)?
            .ok_or_else(|| Error::NotFound(format!("account {}", id)))?;

        if account.balance != expected {
            return Err(Error::Conflict(format!(
                "balance of {} changed concurrently",
                id
            )));
        }

        account.balance = new;
        let cf = self.storage.cf_handle(CF_ACCOUNTS)?;
        self.txn
            .put_cf(cf, id.as_str().as_bytes(), bincode::serialize(&account)?)?;

        Ok(())
    }

    fn insert_transaction(&mut self, record: &Transaction) -> Result<()> {
        if self.locked_transaction(record.id)?.is_some() {
            return Err(Error::AlreadyExists(format!("transaction {}", record.id)));
        }

        // 1. Record
        let cf_transactions = self.storage.cf_handle(CF_TRANSACTIONS)?;
        self.txn.put_cf(
            cf_transactions,
            record.id.as_bytes(),
            bincode::serialize(record)?,
        )?;

        // 2. Indices
        let cf_indices = self.storage.cf_handle(CF_INDICES)?;
        let idx_from = Storage::index_key_participant(&record.from_account_id, record);
        self.txn.put_cf(cf_indices, &idx_from, b"")?;

        let idx_to = Storage::index_key_participant(&record.to_account_id, record);
        self.txn.put_cf(cf_indices, &idx_to, b"")?;

        let idx_history = Storage::index_key_history(record);
        self.txn.put_cf(cf_indices, &idx_history, b"")?;

        // 3. Idempotency key
        if let Some(key) = &record.idempotency_key {
            let cf_idempotency = self.storage.cf_handle(CF_IDEMPOTENCY)?;
            self.txn
                .put_cf(cf_idempotency, key.as_bytes(), record.id.as_bytes())?;
        }

        Ok(())
    }

    fn update_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let mut record = self
            .locked_transaction(id)?
            .ok_or_else(|| Error::NotFound("transaction".to_string()))?;

        record.transition(status)?;

        let cf = self.storage.cf_handle(CF_TRANSACTIONS)?;
        self.txn
            .put_cf(cf, id.as_bytes(), bincode::serialize(&record)?)?;

        Ok(record)
    }

    fn find_by_idempotency_key(&mut self, key: &str) -> Result<Option<Transaction>> {
        let cf = self.storage.cf_handle(CF_IDEMPOTENCY)?;
        // Locks the key even when absent, serializing concurrent first uses
        let Some(id_bytes) = self.txn.get_for_update_cf(cf, key.as_bytes(), true)? else {
            return Ok(None);
        };

        let bytes: [u8; 16] = id_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage(format!("Corrupt idempotency entry for {key}")))?;
        let id = TransactionId::from_bytes(bytes);

        self.locked_transaction(id)?
            .map(Some)
            .ok_or_else(|| Error::Storage(format!("Dangling idempotency entry for {key}")))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let unit = *self;
        unit.txn.commit()?;
        Ok(())
    }
}
