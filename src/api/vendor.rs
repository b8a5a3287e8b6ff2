use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::application::WalletView;
use crate::domain::{EntryStatus, Paise, WithdrawalRequest};

use super::{ApiResult, AppState, VendorIdentity};

const DEFAULT_RECENT_ENTRIES: usize = 20;
const MAX_RECENT_ENTRIES: usize = 200;

#[derive(Debug, Deserialize)]
struct WalletQuery {
    limit: Option<usize>,
}

async fn get_wallet(
    VendorIdentity(vendor_id): VendorIdentity,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WalletQuery>,
) -> ApiResult<Json<WalletView>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_ENTRIES)
        .min(MAX_RECENT_ENTRIES);
    let view = state.service.wallet_view(&vendor_id, limit).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawalPayload {
    amount: Paise,
}

async fn submit_withdrawal(
    VendorIdentity(vendor_id): VendorIdentity,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WithdrawalPayload>,
) -> ApiResult<(StatusCode, Json<WithdrawalRequest>)> {
    let request = state
        .service
        .submit_withdrawal(&vendor_id, payload.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawalList {
    pending: Option<WithdrawalRequest>,
    requests: Vec<WithdrawalRequest>,
}

async fn list_withdrawals(
    VendorIdentity(vendor_id): VendorIdentity,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<WithdrawalList>> {
    let requests = state.service.list_withdrawals(&vendor_id).await?;
    let pending = requests
        .iter()
        .find(|r| r.status == EntryStatus::Pending)
        .cloned();
    Ok(Json(WithdrawalList { pending, requests }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vendors/wallet", get(get_wallet))
        .route(
            "/vendors/withdrawal",
            get(list_withdrawals).post(submit_withdrawal),
        )
}
