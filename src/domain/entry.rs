use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Paise, VendorId};

pub type EntryId = Uuid;

/// Reference to a task or booking in the task subsystem.
pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Money paid in by the vendor (security deposit, top-ups)
    Deposit,
    /// Revenue credited for an online-paid task
    Earning,
    /// Debit imposed for a task violation or cancellation
    Penalty,
    /// Debit charged when the vendor accepts a task
    TaskAcceptanceFee,
    /// Platform share of cash the vendor collected directly
    CashCollection,
    /// Completed payout recorded outside the request flow
    Withdrawal,
    /// Payout requested by the vendor, pending admin resolution
    WithdrawalRequest,
    /// Administrative correction, either sign
    ManualAdjustment,
}

impl EntryType {
    pub const ALL: [EntryType; 8] = [
        EntryType::Deposit,
        EntryType::Earning,
        EntryType::Penalty,
        EntryType::TaskAcceptanceFee,
        EntryType::CashCollection,
        EntryType::Withdrawal,
        EntryType::WithdrawalRequest,
        EntryType::ManualAdjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "deposit",
            EntryType::Earning => "earning",
            EntryType::Penalty => "penalty",
            EntryType::TaskAcceptanceFee => "task_acceptance_fee",
            EntryType::CashCollection => "cash_collection",
            EntryType::Withdrawal => "withdrawal",
            EntryType::WithdrawalRequest => "withdrawal_request",
            EntryType::ManualAdjustment => "manual_adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// The sign an entry of this type must carry.
    pub fn sign(&self) -> AmountSign {
        match self {
            EntryType::Deposit | EntryType::Earning => AmountSign::Credit,
            EntryType::Penalty
            | EntryType::TaskAcceptanceFee
            | EntryType::CashCollection
            | EntryType::Withdrawal
            | EntryType::WithdrawalRequest => AmountSign::Debit,
            EntryType::ManualAdjustment => AmountSign::Either,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSign {
    Credit,
    Debit,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Completed,
    Pending,
    Approved,
    Rejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Completed => "completed",
            EntryStatus::Pending => "pending",
            EntryStatus::Approved => "approved",
            EntryStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Some(EntryStatus::Completed),
            "pending" => Some(EntryStatus::Pending),
            "approved" => Some(EntryStatus::Approved),
            "rejected" => Some(EntryStatus::Rejected),
            _ => None,
        }
    }

    /// Whether an entry in this status contributes to the balance.
    pub fn counts_toward_balance(&self) -> bool {
        !matches!(self, EntryStatus::Rejected)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Online,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "online",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Some(PaymentMethod::Online),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured data attached to an entry. Every figure that explains how an
/// amount was derived lives here as a typed field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_amount: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_amount: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_total: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spare_parts_total: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traveling_amount: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_amount: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gross_before_split: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_share: Option<Paise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrects_entry_id: Option<EntryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EntryMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A signed monetary record attributable to one vendor and one cause.
/// Entries are never deleted; the only field that ever changes after the
/// write is the status of a withdrawal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: EntryId,
    /// Monotonically increasing sequence number, assigned by the store
    pub sequence: i64,
    pub vendor_id: VendorId,
    pub entry_type: EntryType,
    /// Signed paise: positive credits the vendor, negative debits
    pub amount: Paise,
    pub related_task_id: Option<TaskId>,
    pub status: EntryStatus,
    pub metadata: EntryMetadata,
    /// Caller-supplied key making the write safe to retry
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    /// When a withdrawal request left `pending`
    pub resolved_at: Option<DateTime<Utc>>,
    /// Admin note recorded with the resolution
    pub resolution_note: Option<String>,
}

impl LedgerEntry {
    /// Create a new completed entry. Sequence number is assigned by the repository.
    pub fn new(vendor_id: impl Into<VendorId>, entry_type: EntryType, amount: Paise) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            vendor_id: vendor_id.into(),
            entry_type,
            amount,
            related_task_id: None,
            status: EntryStatus::Completed,
            metadata: EntryMetadata::default(),
            idempotency_key: None,
            created_at: Utc::now(),
            resolved_at: None,
            resolution_note: None,
        }
    }

    /// Create a pending withdrawal request reserving `requested` paise.
    pub fn withdrawal_request(vendor_id: impl Into<VendorId>, requested: Paise) -> Self {
        let mut entry = Self::new(vendor_id, EntryType::WithdrawalRequest, -requested);
        entry.status = EntryStatus::Pending;
        entry
    }

    pub fn with_task(mut self, task_id: impl Into<TaskId>) -> Self {
        self.related_task_id = Some(task_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: EntryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.metadata.reason = Some(reason.into());
        self
    }

    pub fn is_withdrawal_request(&self) -> bool {
        self.entry_type == EntryType::WithdrawalRequest
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    /// Amount this entry contributes to the current balance.
    pub fn balance_effect(&self) -> Paise {
        if self.status.counts_toward_balance() {
            self.amount
        } else {
            0
        }
    }
}

/// Reasons a new entry is refused before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryValidationError {
    #[error("amount must not be zero")]
    ZeroAmount,
    #[error("{entry_type} entries must be credits (positive), got {amount}")]
    ExpectedCredit { entry_type: EntryType, amount: Paise },
    #[error("{entry_type} entries must be debits (negative), got {amount}")]
    ExpectedDebit { entry_type: EntryType, amount: Paise },
    #[error("{entry_type} entries must be written as completed, got {status}")]
    StatusNotAllowed {
        entry_type: EntryType,
        status: EntryStatus,
    },
}

/// Validate an entry before append. Does not check cross-entry rules such as
/// the single pending withdrawal request; those need the ledger.
pub fn validate_new_entry(entry: &LedgerEntry) -> Result<(), EntryValidationError> {
    if entry.amount == 0 {
        return Err(EntryValidationError::ZeroAmount);
    }

    match entry.entry_type.sign() {
        AmountSign::Credit if entry.amount < 0 => {
            return Err(EntryValidationError::ExpectedCredit {
                entry_type: entry.entry_type,
                amount: entry.amount,
            });
        }
        AmountSign::Debit if entry.amount > 0 => {
            return Err(EntryValidationError::ExpectedDebit {
                entry_type: entry.entry_type,
                amount: entry.amount,
            });
        }
        _ => {}
    }

    let expected_status = if entry.is_withdrawal_request() {
        EntryStatus::Pending
    } else {
        EntryStatus::Completed
    };
    if entry.status != expected_status {
        return Err(EntryValidationError::StatusNotAllowed {
            entry_type: entry.entry_type,
            status: entry.status,
        });
    }

    Ok(())
}
