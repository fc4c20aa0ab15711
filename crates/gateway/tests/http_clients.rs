//! Exercises the real HTTP clients against a local stand-in server.

use axum::extract::{Form, Json, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use gateway::aqayepardakht::{AqayepardakhtClient, SANDBOX_PIN};
use gateway::nobitex::NobitexOracle;
use gateway::{PaymentGateway, PriceOracle, TransactionExtra, VerificationResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use trx_broker_core::{BrokerError, InvoiceId};

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn gateway_client(base: String) -> std::sync::Arc<AqayepardakhtClient> {
    AqayepardakhtClient::new(
        base,
        SANDBOX_PIN.to_string(),
        "http://127.0.0.1:5000/callback".to_string(),
        Duration::from_millis(500),
    )
    .unwrap()
}

async fn create_ok(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(form.get("pin").map(String::as_str), Some("sandbox"));
    assert_eq!(form.get("amount").map(String::as_str), Some("102000"));
    assert_eq!(form.get("invoice_id").map(String::as_str), Some("12345678"));
    assert_eq!(form.get("description").map(String::as_str), Some("10 TRX"));
    assert!(!form.contains_key("mobile"));
    Json(json!({"status": "success", "transid": "TX-1"}))
}

#[tokio::test]
async fn create_transaction_posts_form_and_builds_redirect() {
    let base = spawn(Router::new().route("/api/v2/create", post(create_ok))).await;
    let client = gateway_client(base.clone());

    let extra = TransactionExtra {
        description: Some("10 TRX".to_string()),
        ..TransactionExtra::default()
    };
    let created = client
        .create_transaction(102_000, InvoiceId(12_345_678), Some(&extra))
        .await
        .unwrap();

    assert_eq!(created.transaction_ref, "TX-1");
    assert_eq!(created.redirect_url, format!("{base}/startpay/sandbox/TX-1"));
}

#[tokio::test]
async fn create_transaction_rejects_non_success_status() {
    let router = Router::new().route(
        "/api/v2/create",
        post(|| async { Json(json!({"status": "error", "code": "-2"})) }),
    );
    let client = gateway_client(spawn(router).await);

    let err = client
        .create_transaction(1000, InvoiceId(12_345_678), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Gateway(_)));
}

#[tokio::test]
async fn create_times_out_as_gateway_error() {
    let router = Router::new().route(
        "/api/v2/create",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"status": "success", "transid": "TX-late"}))
        }),
    );
    let client = gateway_client(spawn(router).await);

    let err = client
        .create_transaction(1000, InvoiceId(12_345_678), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Gateway(_)));
}

#[tokio::test]
async fn create_transaction_rejects_http_error() {
    let router = Router::new().route(
        "/api/v2/create",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let client = gateway_client(spawn(router).await);

    let err = client
        .create_transaction(1000, InvoiceId(12_345_678), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Gateway(msg) if msg.contains("500")));
}

#[tokio::test]
async fn verify_maps_codes_defensively() {
    let router = Router::new().route(
        "/api/v2/verify",
        post(|Json(body): Json<Value>| async move {
            let code = match body["transid"].as_str() {
                Some("paid") => json!(1),
                Some("again") => json!("2"),
                Some("unpaid") => json!(0),
                Some("odd") => json!("7"),
                _ => json!("garbage"),
            };
            assert_eq!(body["amount"], json!(89250));
            Json(json!({ "code": code }))
        }),
    );
    let client = gateway_client(spawn(router).await);

    let cases = [
        ("paid", VerificationResult::Verified),
        ("again", VerificationResult::AlreadyVerified),
        ("unpaid", VerificationResult::NotPaid),
        ("odd", VerificationResult::Unknown(7)),
        ("weird", VerificationResult::Unknown(-99)),
    ];
    for (transid, expected) in cases {
        let got = client.verify_transaction(89_250, transid).await.unwrap();
        assert_eq!(got, expected, "transid {transid}");
    }
}

#[tokio::test]
async fn verify_times_out_as_gateway_error() {
    let router = Router::new().route(
        "/api/v2/verify",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"code": 1}))
        }),
    );
    let client = gateway_client(spawn(router).await);

    let err = client.verify_transaction(1000, "slow").await.unwrap_err();
    assert!(matches!(err, BrokerError::Gateway(_)));
}

#[tokio::test]
async fn nobitex_quote_converts_rial_to_toman() {
    let router = Router::new().route(
        "/market/stats",
        get(|Query(q): Query<HashMap<String, String>>| async move {
            assert_eq!(q.get("srcCurrency").map(String::as_str), Some("trx"));
            assert_eq!(q.get("dstCurrency").map(String::as_str), Some("rls"));
            Json(json!({"status": "ok", "stats": {"trx-rls": {"bestBuy": "85009", "bestSell": "86000"}}}))
        }),
    );
    let oracle = NobitexOracle::new(spawn(router).await, Duration::from_millis(500)).unwrap();

    assert_eq!(oracle.quote().await.unwrap(), 8_500);
}

#[tokio::test]
async fn nobitex_failures_are_upstream_unavailable() {
    let router = Router::new()
        .route(
            "/market/stats",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
    let oracle = NobitexOracle::new(spawn(router).await, Duration::from_millis(500)).unwrap();
    assert!(matches!(
        oracle.quote().await,
        Err(BrokerError::UpstreamUnavailable(_))
    ));

    let router = Router::new().route(
        "/market/stats",
        get(|| async { Json(json!({"stats": {"trx-usdt": {"bestBuy": "1"}}})) }),
    );
    let oracle = NobitexOracle::new(spawn(router).await, Duration::from_millis(500)).unwrap();
    assert!(matches!(
        oracle.quote().await,
        Err(BrokerError::UpstreamUnavailable(_))
    ));

    let router = Router::new().route(
        "/market/stats",
        get(|| async { Json(json!({"stats": {"trx-rls": {"bestBuy": "7"}}})) }),
    );
    let oracle = NobitexOracle::new(spawn(router).await, Duration::from_millis(500)).unwrap();
    assert!(matches!(
        oracle.quote().await,
        Err(BrokerError::UpstreamUnavailable(msg)) if msg.contains("zero price")
    ));
}

#[tokio::test]
async fn nobitex_timeout_is_upstream_unavailable() {
    let router = Router::new().route(
        "/market/stats",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"stats": {"trx-rls": {"bestBuy": "85000"}}}))
        }),
    );
    let oracle = NobitexOracle::new(spawn(router).await, Duration::from_millis(500)).unwrap();

    assert!(matches!(
        oracle.quote().await,
        Err(BrokerError::UpstreamUnavailable(_))
    ));
}
