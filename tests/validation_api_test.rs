//! Public catalog and validation endpoints: /plans with live pricing,
//! /validate/phone and /validate/networks.

use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Utc;
use reqwest::StatusCode;
use tokio::net::TcpListener;
use uuid::Uuid;

use datawaves::config::Config;
use datawaves::db::models::DataPlan;
use datawaves::db::{MemoryStore, Store};
use datawaves::validation::screen::ScreenPolicy;
use datawaves::{build_state, create_app};

fn offline_config() -> Config {
    Config {
        server_port: 0,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        app_url: "http://localhost:3000".to_string(),
        paystack_secret_key: "sk_test_secret".to_string(),
        paystack_base_url: "http://127.0.0.1:1".to_string(),
        reloadly_client_id: "client-id".to_string(),
        reloadly_client_secret: "client-secret".to_string(),
        reloadly_base_url: "http://127.0.0.1:1".to_string(),
        reloadly_auth_url: "http://127.0.0.1:1/oauth/token".to_string(),
        operator_id_mtn: Some(1),
        operator_id_telecel: Some(2),
        operator_id_airteltigo: Some(3),
        low_balance_threshold: 100.0,
        email_api_url: "http://127.0.0.1:1/emails".to_string(),
        email_api_key: None,
        email_from: "no-reply@datawaves.app".to_string(),
        sms_api_url: "http://127.0.0.1:1/sms".to_string(),
        sms_api_key: None,
        admin_email: None,
        admin_phone: None,
        admin_api_key: "admin-secret-key".to_string(),
        screen_url: None,
        screen_api_key: None,
        screen_policy: ScreenPolicy::FailOpen,
        payment_success_url: "http://localhost:3000/payment-success.html".to_string(),
        payment_failed_url: "http://localhost:3000/payment-failed.html".to_string(),
        cors_allowed_origins: None,
    }
}

fn plan(provider: &str, size_gb: u32, base_price: &str) -> DataPlan {
    DataPlan {
        id: Uuid::new_v4(),
        provider: provider.to_string(),
        size_gb: BigDecimal::from(size_gb),
        base_price: BigDecimal::from_str(base_price).unwrap(),
        created_at: Utc::now(),
    }
}

async fn spawn_app(store: Arc<MemoryStore>) -> (String, reqwest::Client) {
    let app_store: Arc<dyn Store> = store;
    let state = build_state(offline_config(), app_store).await.unwrap();
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), reqwest::Client::new())
}

async fn validate(
    client: &reqwest::Client,
    base_url: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let res = client
        .post(format!("{base_url}/validate/phone"))
        .json(&body)
        .send()
        .await
        .unwrap();
    // validation verdicts always travel in a 200 body
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn test_plans_carry_marked_up_prices() {
    let store = Arc::new(MemoryStore::new());
    store.add_plan(plan("mtn", 5, "20.00")).await;
    store.add_plan(plan("telecel", 10, "35.00")).await;
    store
        .add_markup("mtn", BigDecimal::from_str("5.0").unwrap())
        .await;
    // telecel has no markup row, so it sells at cost
    let (base_url, client) = spawn_app(store).await;

    let res = client
        .get(format!("{base_url}/plans"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let plans: Vec<serde_json::Value> = res.json().await.unwrap();
    assert_eq!(plans.len(), 2);

    let mtn = plans.iter().find(|p| p["provider"] == "mtn").unwrap();
    let telecel = plans.iter().find(|p| p["provider"] == "telecel").unwrap();

    let mtn_price = BigDecimal::from_str(mtn["customer_price"].as_str().unwrap()).unwrap();
    assert_eq!(mtn_price, BigDecimal::from_str("21.00").unwrap());
    assert_eq!(mtn["base_price"], "20.00");

    let telecel_price = BigDecimal::from_str(telecel["customer_price"].as_str().unwrap()).unwrap();
    assert_eq!(telecel_price, BigDecimal::from_str("35.00").unwrap());
}

#[tokio::test]
async fn test_plans_filter_by_provider() {
    let store = Arc::new(MemoryStore::new());
    store.add_plan(plan("mtn", 5, "20.00")).await;
    store.add_plan(plan("mtn", 10, "38.00")).await;
    store.add_plan(plan("telecel", 5, "22.00")).await;
    let (base_url, client) = spawn_app(store).await;

    let res = client
        .get(format!("{base_url}/plans?provider=MTN"))
        .send()
        .await
        .unwrap();
    let plans: Vec<serde_json::Value> = res.json().await.unwrap();

    assert_eq!(plans.len(), 2);
    assert!(plans.iter().all(|p| p["provider"] == "mtn"));
}

#[tokio::test]
async fn test_validate_phone_detects_network() {
    let (base_url, client) = spawn_app(Arc::new(MemoryStore::new())).await;

    let body = validate(
        &client,
        &base_url,
        serde_json::json!({"phone_number": "0241234567"}),
    )
    .await;

    assert_eq!(body["valid"], true);
    assert_eq!(body["phone_number"], "+233241234567");
    assert_eq!(body["local_format"], "0241234567");
    assert_eq!(body["detected_network"], "mtn");
}

#[tokio::test]
async fn test_validate_phone_accepts_international_format() {
    let (base_url, client) = spawn_app(Arc::new(MemoryStore::new())).await;

    let body = validate(
        &client,
        &base_url,
        serde_json::json!({"phone_number": "+233201234567", "network": "telecel"}),
    )
    .await;

    assert_eq!(body["valid"], true);
    assert_eq!(body["detected_network"], "telecel");
}

#[tokio::test]
async fn test_validate_phone_flags_network_mismatch() {
    let (base_url, client) = spawn_app(Arc::new(MemoryStore::new())).await;

    let body = validate(
        &client,
        &base_url,
        serde_json::json!({"phone_number": "0241234567", "network": "telecel"}),
    )
    .await;

    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "WRONG_NETWORK");
    assert_eq!(body["detected_network"], "mtn");
}

#[tokio::test]
async fn test_validate_phone_rejects_malformed_number() {
    let (base_url, client) = spawn_app(Arc::new(MemoryStore::new())).await;

    let body = validate(
        &client,
        &base_url,
        serde_json::json!({"phone_number": "12345"}),
    )
    .await;

    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_validate_phone_rejects_unknown_prefix() {
    let (base_url, client) = spawn_app(Arc::new(MemoryStore::new())).await;

    let body = validate(
        &client,
        &base_url,
        serde_json::json!({"phone_number": "0991234567"}),
    )
    .await;

    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "UNKNOWN_PREFIX");
}

#[tokio::test]
async fn test_validate_phone_rejects_unsupported_network_name() {
    let (base_url, client) = spawn_app(Arc::new(MemoryStore::new())).await;

    let body = validate(
        &client,
        &base_url,
        serde_json::json!({"phone_number": "0241234567", "network": "glo"}),
    )
    .await;

    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "UNSUPPORTED_NETWORK");
}

#[tokio::test]
async fn test_networks_catalog_lists_prefixes() {
    let (base_url, client) = spawn_app(Arc::new(MemoryStore::new())).await;

    let res = client
        .get(format!("{base_url}/validate/networks"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["networks"]["mtn"]["name"], "MTN");
    let mtn_prefixes = body["networks"]["mtn"]["prefixes"].as_array().unwrap();
    assert!(mtn_prefixes.contains(&serde_json::json!("24")));
    assert_eq!(body["networks"]["telecel"]["name"], "Telecel");
    assert_eq!(body["networks"]["airteltigo"]["name"], "AirtelTigo");
}
