use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::application::AppError;
use crate::domain::WithdrawalRequest;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    App(#[from] AppError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<Value>) {
        match self {
            ApiError::App(err) => match err {
                AppError::Validation { field, .. } => (
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    err.to_string(),
                    Some(json!({ "field": field })),
                ),
                AppError::InvalidAmount(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid_amount",
                    err.to_string(),
                    None,
                ),
                AppError::InsufficientWithdrawableAmount {
                    requested,
                    withdrawable,
                } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "insufficient_withdrawable_amount",
                    err.to_string(),
                    Some(json!({ "requested": requested, "withdrawable": withdrawable })),
                ),
                AppError::DuplicatePendingRequest { existing } => (
                    StatusCode::CONFLICT,
                    "duplicate_pending_request",
                    err.to_string(),
                    WithdrawalRequest::from_entry(existing)
                        .map(|request| json!({ "existing": request })),
                ),
                AppError::InvalidTransition { .. } => (
                    StatusCode::CONFLICT,
                    "invalid_transition",
                    err.to_string(),
                    None,
                ),
                AppError::WalletAlreadyExists(_) => (
                    StatusCode::CONFLICT,
                    "wallet_already_exists",
                    err.to_string(),
                    None,
                ),
                AppError::WalletNotFound(_) | AppError::EntryNotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", err.to_string(), None)
                }
                // Internal failures are logged, never echoed to the caller
                AppError::Consistency { .. } | AppError::Database(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                ),
            },
            ApiError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "bad_request", reason.clone(), None)
            }
            ApiError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", reason.clone(), None)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ErrorBody {
            code: status.as_u16(),
            error,
            message,
            details,
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
