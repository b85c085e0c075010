//! HTTP handlers

use super::dto::{
    AccountMessage, ErrorMessage, HealthMessage, PageParams, TransactionMessage,
    TransactionPage, TransferRequestMessage,
};
use crate::{error::ErrorKind, Error, Ledger};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Shared handler state
pub type AppState = Arc<Ledger>;

/// Ledger error rendered as `{kind, message}`
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Conflict | ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        match kind {
            ErrorKind::Internal => error!(error = %self.0, "Request failed"),
            ErrorKind::DeadlineExceeded | ErrorKind::Conflict => {
                warn!(error = %self.0, kind = %kind, "Request failed")
            }
            _ => {}
        }

        let body = ErrorMessage {
            kind: kind.as_str().to_string(),
            message: self.0.to_string(),
        };
        (status_for(kind), Json(body)).into_response()
    }
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError(Error::InvalidArgument(rejection.body_text()))
}

fn bad_query(rejection: QueryRejection) -> ApiError {
    ApiError(Error::InvalidArgument(rejection.body_text()))
}

/// `POST /v1/transfers`
pub async fn transfer(
    State(ledger): State<AppState>,
    payload: Result<Json<TransferRequestMessage>, JsonRejection>,
) -> Result<Json<TransactionMessage>, ApiError> {
    let Json(message) = payload.map_err(bad_json)?;

    let timeout = match message.timeout_ms {
        Some(0) => {
            return Err(ApiError(Error::InvalidArgument(
                "timeout_ms must be positive".to_string(),
            )))
        }
        Some(ms) => Duration::from_millis(ms),
        None => ledger.config().transfer.default_timeout(),
    };

    let record = ledger
        .engine()
        .transfer_with_timeout(message.into(), timeout)
        .await?;

    Ok(Json(TransactionMessage::from(&record)))
}

/// `GET /v1/transactions/:id`
pub async fn get_transaction(
    State(ledger): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionMessage>, ApiError> {
    let record = ledger.query().get_transaction(&id).await?;
    Ok(Json(TransactionMessage::from(&record)))
}

/// `GET /v1/accounts/:id`
pub async fn get_account(
    State(ledger): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountMessage>, ApiError> {
    let account = ledger.query().get_account(&id).await?;
    Ok(Json(AccountMessage::from(&account)))
}

/// `GET /v1/accounts/:id/transactions`
pub async fn list_account_transactions(
    State(ledger): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<TransactionPage>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let (limit, offset) = page_bounds(&ledger, params);

    let records = ledger
        .query()
        .list_transactions_for_account(&id, limit, offset)
        .await?;
    Ok(Json(TransactionPage::new(&records, limit, offset)))
}

/// `GET /v1/transactions`
pub async fn list_transactions(
    State(ledger): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<TransactionPage>, ApiError> {
    let Query(params) = params.map_err(bad_query)?;
    let (limit, offset) = page_bounds(&ledger, params);

    let records = ledger
        .query()
        .list_transaction_history(limit, offset)
        .await?;
    Ok(Json(TransactionPage::new(&records, limit, offset)))
}

/// Absent limit means the default page; an explicit 0 stays an empty page
fn page_bounds(ledger: &Ledger, params: PageParams) -> (usize, usize) {
    let query = ledger.query();
    let limit = params.limit.unwrap_or_else(|| query.default_page_size());
    (query.clamp(limit), params.offset.unwrap_or(0))
}

/// `GET /health`
pub async fn health(State(ledger): State<AppState>) -> Json<HealthMessage> {
    let config = ledger.config();
    Json(HealthMessage {
        status: "healthy".to_string(),
        service: config.service_name.clone(),
        version: config.service_version.clone(),
    })
}

/// `GET /metrics`
pub async fn metrics(State(ledger): State<AppState>) -> Result<Response, ApiError> {
    let text = ledger
        .metrics()
        .export()
        .map_err(|e| Error::Internal(format!("Failed to export metrics: {}", e)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}
