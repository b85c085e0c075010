//! Main ledger orchestration layer
//!
//! Ties storage, the transfer engine, the query service and metrics
//! together behind one handle shared by the RPC layer.
//!
//! # Example
//!
//! ```no_run
//! use money_ledger::{Config, Ledger, TransferRequest};
//!
//! #[tokio::main]
//! async fn main() -> money_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config)?;
//!     ledger.seed()?;
//!
//!     let accounts = ledger.accounts()?;
//!     let request = TransferRequest::new(
//!         accounts[0].id.as_str(),
//!         accounts[1].id.as_str(),
//!         "25.00",
//!         "USD",
//!     );
//!     let record = ledger.engine().transfer(request).await?;
//!     println!("{} {}", record.id, record.status);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    engine::TransferEngine,
    metrics::Metrics,
    query::QueryService,
    seed::seed_accounts,
    store::AccountStore,
    types::Account,
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Main ledger interface
pub struct Ledger {
    /// Durable store
    storage: Arc<Storage>,

    /// Transfer engine
    engine: TransferEngine,

    /// Read path
    query: QueryService,

    /// Prometheus metrics
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Internal(format!("Failed to register metrics: {}", e)))?;

        let engine = TransferEngine::new(storage.clone(), config.transfer.clone(), metrics.clone());
        let query = QueryService::new(storage.clone(), config.query.clone());

        info!(
            data_dir = %config.data_dir.display(),
            service = %config.service_name,
            version = %config.service_version,
            "Ledger opened"
        );

        Ok(Self {
            storage,
            engine,
            query,
            metrics,
            config,
        })
    }

    /// Provision the configured fixture accounts
    pub fn seed(&self) -> Result<usize> {
        let created = seed_accounts(self.storage.as_ref(), &self.config.seed.accounts)?;
        info!(created, "Seed accounts loaded");
        Ok(created)
    }

    /// Transfer engine
    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    /// Query service
    pub fn query(&self) -> &QueryService {
        &self.query
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying storage
    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Every account, in id order
    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.storage.list_accounts()
    }

    /// Sum of every balance
    ///
    /// Transfers only move money, so this stays constant between account
    /// provisioning events.
    pub fn total_balance(&self) -> Result<Decimal> {
        self.storage
            .list_accounts()?
            .iter()
            .try_fold(Decimal::ZERO, |total, account| total.checked_add(account.balance))
            .ok_or_else(|| Error::Internal("total balance overflows".to_string()))
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("data_dir", &self.config.data_dir)
            .finish_non_exhaustive()
    }
}
