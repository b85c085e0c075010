//! JSON-over-HTTP transport
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /v1/transfers` | [`routes::transfer`] |
//! | `GET /v1/transactions` | [`routes::list_transactions`] |
//! | `GET /v1/transactions/:id` | [`routes::get_transaction`] |
//! | `GET /v1/accounts/:id` | [`routes::get_account`] |
//! | `GET /v1/accounts/:id/transactions` | [`routes::list_account_transactions`] |
//! | `GET /health` | [`routes::health`] |
//! | `GET /metrics` | [`routes::metrics`] |

pub mod dto;
pub mod routes;

use crate::{Ledger, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the router over a shared ledger
pub fn router(ledger: Arc<Ledger>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .route("/v1/transfers", post(routes::transfer))
        .route("/v1/transactions", get(routes::list_transactions))
        .route("/v1/transactions/:id", get(routes::get_transaction))
        .route("/v1/accounts/:id", get(routes::get_account))
        .route(
            "/v1/accounts/:id/transactions",
            get(routes::list_account_transactions),
        )
        .with_state(ledger)
}

/// Serve until ctrl-c
pub async fn serve(ledger: Arc<Ledger>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Ledger RPC listening");

    axum::serve(listener, router(ledger))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Ledger RPC stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for ctrl-c, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
