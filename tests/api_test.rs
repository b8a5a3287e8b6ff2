mod common;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use vendor_wallet::api::{app_router, AppState};
use vendor_wallet::application::WalletService;
use vendor_wallet::config::Config;

async fn test_app(pairs: &[(&str, &str)]) -> Result<(Router, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("api.db");
    let owned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = Config::from_lookup(|key| {
        owned
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })?;
    let service = WalletService::init(db_path.to_str().unwrap(), config.ledger).await?;
    let app = app_router(AppState::new(service, &config), &config);
    Ok((app, temp_dir))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

const VENDOR: &[(&str, &str)] = &[("x-vendor-id", "v1")];

/// Open v1 and credit it with `deposit + earning` through the API.
async fn fund_vendor(app: &Router, earning: i64) {
    let (status, _) = send(app, "POST", "/api/v1/admin/wallets", &[], Some(json!({"vendorId": "v1"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        app,
        "POST",
        "/api/v1/events/payment-confirmed",
        &[],
        Some(json!({"vendorId": "v1", "amount": 500000, "gatewayReference": "pay-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app,
        "POST",
        "/api/v1/events/task-closed",
        &[],
        Some(json!({
            "taskId": "task-1",
            "vendorId": "v1",
            "billingAmount": earning,
            "travelingAmount": 0,
            "paymentMethod": "online"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_healthz() -> Result<()> {
    let (app, _temp) = test_app(&[]).await?;
    let (status, _) = send(&app, "GET", "/api/v1/healthz", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_wallet_view_for_vendor() -> Result<()> {
    let (app, _temp) = test_app(&[]).await?;
    fund_vendor(&app, 30_000).await;

    let (status, body) = send(&app, "GET", "/api/v1/vendors/wallet?limit=1", VENDOR, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vendorId"], "v1");
    assert_eq!(body["summary"]["currentBalance"], 530_000);
    assert_eq!(body["summary"]["availableBalance"], 30_000);
    assert_eq!(body["summary"]["withdrawableAmount"], 0);
    assert_eq!(body["summary"]["hasInitialDeposit"], true);
    assert_eq!(body["recentEntries"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["recentEntries"][0]["entryType"], "earning");
    Ok(())
}

#[tokio::test]
async fn test_vendor_routes_require_identity() -> Result<()> {
    let (app, _temp) = test_app(&[]).await?;
    let (status, body) = send(&app, "GET", "/api/v1/vendors/wallet", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);

    let (status, body) = send(&app, "GET", "/api/v1/vendors/wallet", &[("x-vendor-id", "ghost")], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    Ok(())
}

#[tokio::test]
async fn test_withdrawal_error_statuses() -> Result<()> {
    let (app, _temp) = test_app(&[]).await?;
    fund_vendor(&app, 520_000).await;

    let (status, body) = send(&app, "POST", "/api/v1/vendors/withdrawal", VENDOR, Some(json!({"amount": 30000}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_withdrawable_amount");
    assert_eq!(body["details"]["withdrawable"], 20_000);

    let (status, created) = send(&app, "POST", "/api/v1/vendors/withdrawal", VENDOR, Some(json!({"amount": 20000}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["amount"], 20_000);

    let (status, body) = send(&app, "POST", "/api/v1/vendors/withdrawal", VENDOR, Some(json!({"amount": 1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_pending_request");
    assert_eq!(body["details"]["existing"]["id"], created["id"]);

    let (status, body) = send(&app, "POST", "/api/v1/vendors/withdrawal", VENDOR, Some(json!({"amount": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = send(&app, "GET", "/api/v1/vendors/withdrawal", VENDOR, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"]["id"], created["id"]);
    assert_eq!(body["requests"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_admin_resolves_withdrawals() -> Result<()> {
    let (app, _temp) = test_app(&[("VW_WITHDRAWAL_POLICY", "single_threshold")]).await?;
    fund_vendor(&app, 50_000).await;

    let (_, created) = send(&app, "POST", "/api/v1/vendors/withdrawal", VENDOR, Some(json!({"amount": 50000}))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, rejected) = send(
        &app,
        "POST",
        &format!("/api/v1/admin/withdrawals/{id}/reject"),
        &[],
        Some(json!({"reason": "kyc pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["resolutionNote"], "kyc pending");

    let (status, body) = send(&app, "POST", &format!("/api/v1/admin/withdrawals/{id}/approve"), &[], None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    let (_, view) = send(&app, "GET", "/api/v1/vendors/wallet", VENDOR, None).await;
    assert_eq!(view["summary"]["currentBalance"], 550_000);

    let unknown = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "POST", &format!("/api/v1/admin/withdrawals/{unknown}/approve"), &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_task_closed_uses_configured_travel_charge() -> Result<()> {
    let (app, _temp) = test_app(&[]).await?;
    fund_vendor(&app, 10_000).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/events/task-closed",
        &[],
        Some(json!({
            "taskId": "task-cash",
            "vendorId": "v1",
            "billingAmount": 100000,
            "sparePartsTotal": 20000,
            "paymentMethod": "cash"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settlement"]["grossBeforeSplit"], 70_000);
    assert_eq!(body["settlement"]["walletDelta"], -65_000);
    assert_eq!(body["entries"][0]["amount"], -65_000);
    assert_eq!(body["replayed"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/events/task-closed",
        &[],
        Some(json!({
            "taskId": "task-zero",
            "vendorId": "v1",
            "billingAmount": 0,
            "paymentMethod": "online"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_amount");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/events/task-closed",
        &[],
        Some(json!({
            "taskId": "task-huge",
            "vendorId": "v1",
            "billingAmount": i64::MAX,
            "sparePartsTotal": i64::MAX,
            "travelingAmount": i64::MAX,
            "paymentMethod": "cash"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = send(&app, "GET", "/api/v1/vendors/wallet", VENDOR, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["currentBalance"], 445_000);
    Ok(())
}

#[tokio::test]
async fn test_admin_routes_require_token_when_configured() -> Result<()> {
    let (app, _temp) = test_app(&[("VW_ADMIN_TOKEN", "s3cret")]).await?;
    let payload = json!({"vendorId": "v1"});

    let (status, _) = send(&app, "POST", "/api/v1/admin/wallets", &[], Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/admin/wallets",
        &[("authorization", "Bearer wrong")],
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = &[("authorization", "Bearer s3cret")];
    let (status, wallet) = send(&app, "POST", "/api/v1/admin/wallets", admin, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(wallet["securityDeposit"], 500_000);

    let (status, body) = send(&app, "POST", "/api/v1/admin/wallets", admin, Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "wallet_already_exists");

    let (status, report) = send(&app, "GET", "/api/v1/admin/integrity", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["walletCount"], 1);
    assert_eq!(report["inconsistentWallets"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_admin_entries_and_reconcile() -> Result<()> {
    let (app, _temp) = test_app(&[]).await?;
    fund_vendor(&app, 10_000).await;

    let (status, penalty) = send(
        &app,
        "POST",
        "/api/v1/admin/vendors/v1/entries",
        &[],
        Some(json!({"kind": "penalty", "amount": 5000, "reason": "no-show"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(penalty["entryType"], "penalty");
    assert_eq!(penalty["amount"], -5_000);

    let (status, adjustment) = send(
        &app,
        "POST",
        "/api/v1/admin/vendors/v1/entries",
        &[],
        Some(json!({"kind": "manual_adjustment", "amount": 5000, "correctsEntryId": penalty["id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(adjustment["metadata"]["correctsEntryId"], penalty["id"]);

    let (status, outcome) = send(&app, "POST", "/api/v1/admin/vendors/v1/reconcile", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["repaired"], false);
    assert_eq!(outcome["check"]["reconciled"], 510_000);
    Ok(())
}
