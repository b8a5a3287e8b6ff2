use thiserror::Error;

use crate::domain::{
    EntryId, EntryStatus, EntryValidationError, LedgerEntry, Paise, SettlementError,
    WithdrawalError,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Requested {requested} exceeds withdrawable amount {withdrawable}")]
    InsufficientWithdrawableAmount {
        requested: Paise,
        withdrawable: Paise,
    },

    #[error("A withdrawal request is already pending: {}", existing.id)]
    DuplicatePendingRequest { existing: Box<LedgerEntry> },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Withdrawal request {id} is {from} and cannot become {to}")]
    InvalidTransition {
        id: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    },

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Wallet already exists: {0}")]
    WalletAlreadyExists(String),

    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    #[error("Cached balance {cached} for vendor {vendor_id} diverges from ledger balance {reconciled}")]
    Consistency {
        vendor_id: String,
        cached: Paise,
        reconciled: Paise,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<EntryValidationError> for AppError {
    fn from(err: EntryValidationError) -> Self {
        AppError::validation("amount", err.to_string())
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::InvalidAmount(amount) => AppError::InvalidAmount(format!(
                "billing amount must be positive, got {amount}"
            )),
            SettlementError::Validation { field, message } => AppError::validation(field, message),
        }
    }
}

impl From<WithdrawalError> for AppError {
    fn from(err: WithdrawalError) -> Self {
        match err {
            WithdrawalError::NonPositiveAmount(amount) => {
                AppError::validation("amount", format!("must be positive, got {amount}"))
            }
            WithdrawalError::DuplicatePending { existing } => {
                AppError::DuplicatePendingRequest { existing }
            }
            WithdrawalError::InsufficientWithdrawable {
                requested,
                withdrawable,
            } => AppError::InsufficientWithdrawableAmount {
                requested,
                withdrawable,
            },
            WithdrawalError::NotARequest(id) => AppError::EntryNotFound(id.to_string()),
            WithdrawalError::InvalidTransition { id, from, to } => {
                AppError::InvalidTransition { id, from, to }
            }
        }
    }
}
