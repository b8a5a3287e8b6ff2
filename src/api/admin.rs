use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::application::{IntegrityReport, ReconcileOutcome};
use crate::domain::{EntryId, LedgerEntry, Paise, TaskId, VendorId, Wallet, WithdrawalRequest};

use super::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenWalletPayload {
    vendor_id: VendorId,
}

async fn open_wallet(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OpenWalletPayload>,
) -> ApiResult<(StatusCode, Json<Wallet>)> {
    let wallet = state.service.open_wallet(&payload.vendor_id).await?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

async fn list_wallets(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Wallet>>> {
    Ok(Json(state.service.list_wallets().await?))
}

async fn approve_withdrawal(
    Path(id): Path<EntryId>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<WithdrawalRequest>> {
    Ok(Json(state.service.approve_withdrawal(id).await?))
}

#[derive(Debug, Default, Deserialize)]
struct RejectPayload {
    #[serde(default)]
    reason: Option<String>,
}

async fn reject_withdrawal(
    Path(id): Path<EntryId>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RejectPayload>,
) -> ApiResult<Json<WithdrawalRequest>> {
    let reason = payload.reason.filter(|r| !r.trim().is_empty());
    Ok(Json(state.service.reject_withdrawal(id, reason).await?))
}

/// Administrative entry kinds. Amounts are positive magnitudes for the debits
/// and signed for adjustments.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum AdminEntryPayload {
    #[serde(rename_all = "camelCase")]
    Penalty {
        amount: Paise,
        task_id: Option<TaskId>,
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TaskAcceptanceFee { amount: Paise, task_id: TaskId },
    #[serde(rename_all = "camelCase")]
    ManualAdjustment {
        amount: Paise,
        corrects_entry_id: Option<EntryId>,
        reason: Option<String>,
    },
}

async fn record_entry(
    Path(vendor_id): Path<VendorId>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AdminEntryPayload>,
) -> ApiResult<(StatusCode, Json<LedgerEntry>)> {
    let service = &state.service;
    let entry = match payload {
        AdminEntryPayload::Penalty {
            amount,
            task_id,
            reason,
        } => service.record_penalty(&vendor_id, amount, task_id, reason).await?,
        AdminEntryPayload::TaskAcceptanceFee { amount, task_id } => {
            if task_id.trim().is_empty() {
                return Err(ApiError::BadRequest("taskId is required".into()));
            }
            service
                .record_acceptance_fee(&vendor_id, amount, task_id)
                .await?
        }
        AdminEntryPayload::ManualAdjustment {
            amount,
            corrects_entry_id,
            reason,
        } => {
            service
                .record_adjustment(&vendor_id, amount, corrects_entry_id, reason)
                .await?
        }
    };
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn reconcile_vendor(
    Path(vendor_id): Path<VendorId>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ReconcileOutcome>> {
    Ok(Json(state.service.reconcile(&vendor_id).await?))
}

async fn integrity(State(state): State<Arc<AppState>>) -> ApiResult<Json<IntegrityReport>> {
    Ok(Json(state.service.check_integrity().await?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/wallets", get(list_wallets).post(open_wallet))
        .route("/withdrawals/{id}/approve", post(approve_withdrawal))
        .route("/withdrawals/{id}/reject", post(reject_withdrawal))
        .route("/vendors/{vendor_id}/entries", post(record_entry))
        .route("/vendors/{vendor_id}/reconcile", post(reconcile_vendor))
        .route("/integrity", get(integrity))
}
