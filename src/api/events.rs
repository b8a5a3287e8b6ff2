use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::application::{EntryResult, SettlementResult};
use crate::domain::{Paise, PaymentMethod, TaskClosed, TaskId, VendorId};

use super::{ApiError, ApiResult, AppState};

/// Task closure as published by the task subsystem. The travel charge falls
/// back to the configured constant when omitted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskClosedPayload {
    pub task_id: TaskId,
    pub vendor_id: VendorId,
    pub billing_amount: Paise,
    #[serde(default)]
    pub spare_parts_total: Paise,
    pub traveling_amount: Option<Paise>,
    #[serde(default)]
    pub booking_amount: Paise,
    #[serde(default)]
    pub gst_included: bool,
    pub payment_method: PaymentMethod,
}

impl TaskClosedPayload {
    pub fn into_event(self, default_traveling_amount: Paise) -> TaskClosed {
        TaskClosed {
            task_id: self.task_id,
            vendor_id: self.vendor_id,
            billing_amount: self.billing_amount,
            spare_parts_total: self.spare_parts_total,
            traveling_amount: self.traveling_amount.unwrap_or(default_traveling_amount),
            booking_amount: self.booking_amount,
            gst_included: self.gst_included,
            payment_method: self.payment_method,
        }
    }
}

async fn task_closed(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TaskClosedPayload>,
) -> ApiResult<Json<SettlementResult>> {
    let event = payload.into_event(state.service.settings().traveling_amount);
    let result = state.service.settle_task(&event).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentConfirmedPayload {
    vendor_id: VendorId,
    amount: Paise,
    gateway_reference: String,
}

async fn payment_confirmed(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PaymentConfirmedPayload>,
) -> ApiResult<Json<EntryResult>> {
    if payload.gateway_reference.trim().is_empty() {
        return Err(ApiError::BadRequest("gatewayReference is required".into()));
    }
    let result = state
        .service
        .record_deposit(
            &payload.vendor_id,
            payload.amount,
            Some(payload.gateway_reference.trim()),
        )
        .await?;
    Ok(Json(result))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/task-closed", post(task_closed))
        .route("/events/payment-confirmed", post(payment_confirmed))
}
