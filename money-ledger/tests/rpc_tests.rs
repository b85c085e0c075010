//! HTTP surface driven through the router without a socket

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use money_ledger::{
    rpc::{self, dto::TransactionMessage},
    store::AccountStore,
    Account, AccountId, Config, Ledger,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> (Router, Arc<Ledger>, TempDir) {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = temp.path().to_path_buf();
    config.rocksdb.sync_writes = false;
    config.query.max_page_size = 3;

    let ledger = Ledger::open(config).unwrap();
    for (id, balance) in [("alice", "1000.00"), ("bob", "750.50")] {
        let account = Account::new(
            id,
            format!("{id}@example.com"),
            Decimal::from_str(balance).unwrap(),
        )
        .with_id(AccountId::new(id));
        ledger.storage().create_account(&account).unwrap();
    }

    let ledger = Arc::new(ledger);
    (rpc::router(ledger.clone()), ledger, temp)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn transfer_body(from: &str, to: &str, amount: &str) -> Value {
    json!({
        "from_account_id": from,
        "to_account_id": to,
        "amount": amount,
        "currency": "USD",
    })
}

#[tokio::test]
async fn test_transfer_then_lookup() {
    let (app, _ledger, _temp) = app();

    let (status, body) = send(
        &app,
        post_json("/v1/transfers", transfer_body("alice", "bob", "250.00")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let record: TransactionMessage = serde_json::from_value(body).unwrap();
    assert_eq!(record.status, "completed");
    assert_eq!(record.amount, "250.00");

    let (status, body) = send(&app, get(&format!("/v1/transactions/{}", record.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], record.id.as_str());
    assert_eq!(body["from_account_id"], "alice");

    let (status, body) = send(&app, get("/v1/accounts/alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], "750.00");

    let (_, body) = send(&app, get("/v1/accounts/bob")).await;
    assert_eq!(body["balance"], "1000.50");
}

#[tokio::test]
async fn test_error_kinds_map_to_status() {
    let (app, _ledger, _temp) = app();

    let cases = [
        (transfer_body("alice", "alice", "1"), StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
        (transfer_body("alice", "bob", "-1"), StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
        (transfer_body("ghost", "bob", "1"), StatusCode::NOT_FOUND, "NOT_FOUND"),
        (
            transfer_body("bob", "alice", "750.51"),
            StatusCode::PRECONDITION_FAILED,
            "FAILED_PRECONDITION",
        ),
    ];

    for (request, expected_status, expected_kind) in cases {
        let (status, body) = send(&app, post_json("/v1/transfers", request)).await;
        assert_eq!(status, expected_status);
        assert_eq!(body["kind"], expected_kind);
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_argument() {
    let (app, _ledger, _temp) = app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/transfers")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_lookup_errors() {
    let (app, _ledger, _temp) = app();

    let (status, body) = send(&app, get("/v1/transactions/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");

    let missing = uuid::Uuid::now_v7();
    let (status, body) = send(&app, get(&format!("/v1/transactions/{missing}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");

    let (status, _) = send(&app, get("/v1/accounts/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/v1/accounts/ghost/transactions")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pagination() {
    let (app, _ledger, _temp) = app();

    for _ in 0..5 {
        let (status, _) = send(
            &app,
            post_json("/v1/transfers", transfer_body("alice", "bob", "1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // Capped at the configured maximum
    let (status, body) = send(&app, get("/v1/transactions?limit=100")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 3);
    assert_eq!(body["limit"], 3);

    let (_, body) = send(&app, get("/v1/accounts/bob/transactions?limit=3&offset=3")).await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get("/v1/transactions?limit=0")).await;
    assert!(body["transactions"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, get("/v1/transactions?limit=lots")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_idempotent_transfer_over_http() {
    let (app, ledger, _temp) = app();

    let mut body = transfer_body("alice", "bob", "10");
    body["idempotency_key"] = json!("retry-me");

    let (_, first) = send(&app, post_json("/v1/transfers", body.clone())).await;
    let (_, second) = send(&app, post_json("/v1/transfers", body)).await;
    assert_eq!(first["id"], second["id"]);

    let alice = ledger.storage().get_account(&AccountId::new("alice")).unwrap();
    assert_eq!(alice.balance.to_string(), "990.00");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (app, _ledger, _temp) = app();

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "money-ledger");

    send(
        &app,
        post_json("/v1/transfers", transfer_body("alice", "bob", "1")),
    )
    .await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("ledger_transfers_total{outcome=\"completed\"} 1"));
}
