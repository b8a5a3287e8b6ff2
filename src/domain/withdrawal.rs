use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EntryId, EntryStatus, LedgerEntry, Paise, VendorId};

/// Admin decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(&self) -> EntryStatus {
        match self {
            Decision::Approve => EntryStatus::Approved,
            Decision::Reject => EntryStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WithdrawalError {
    #[error("withdrawal amount must be positive, got {0}")]
    NonPositiveAmount(Paise),
    #[error("a withdrawal request is already pending")]
    DuplicatePending { existing: Box<LedgerEntry> },
    #[error("requested {requested} exceeds withdrawable amount {withdrawable}")]
    InsufficientWithdrawable {
        requested: Paise,
        withdrawable: Paise,
    },
    #[error("entry {0} is not a withdrawal request")]
    NotARequest(EntryId),
    #[error("withdrawal request {id} is {from}, cannot move to {to}")]
    InvalidTransition {
        id: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    },
}

/// Check a new request against the ledger snapshot taken under the vendor lock.
/// The pending check runs first so a duplicate is reported regardless of amount.
pub fn check_submission(
    requested: Paise,
    withdrawable: Paise,
    pending: Option<&LedgerEntry>,
) -> Result<(), WithdrawalError> {
    if requested <= 0 {
        return Err(WithdrawalError::NonPositiveAmount(requested));
    }
    if let Some(existing) = pending {
        return Err(WithdrawalError::DuplicatePending {
            existing: Box::new(existing.clone()),
        });
    }
    if requested > withdrawable {
        return Err(WithdrawalError::InsufficientWithdrawable {
            requested,
            withdrawable,
        });
    }
    Ok(())
}

/// Validate a transition and return the new status. Only `pending` requests
/// move, and they move exactly once.
pub fn transition(entry: &LedgerEntry, decision: Decision) -> Result<EntryStatus, WithdrawalError> {
    if !entry.is_withdrawal_request() {
        return Err(WithdrawalError::NotARequest(entry.id));
    }
    let to = decision.target_status();
    if entry.status != EntryStatus::Pending {
        return Err(WithdrawalError::InvalidTransition {
            id: entry.id,
            from: entry.status,
            to,
        });
    }
    Ok(to)
}

/// Vendor-facing view of a `withdrawal_request` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: EntryId,
    pub vendor_id: VendorId,
    /// Requested payout, positive
    pub amount: Paise,
    pub status: EntryStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl WithdrawalRequest {
    pub fn from_entry(entry: &LedgerEntry) -> Option<Self> {
        if !entry.is_withdrawal_request() {
            return None;
        }
        Some(Self {
            id: entry.id,
            vendor_id: entry.vendor_id.clone(),
            amount: -entry.amount,
            status: entry.status,
            requested_at: entry.created_at,
            resolved_at: entry.resolved_at,
            resolution_note: entry.resolution_note.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryType;

    #[test]
    fn test_submission_within_limit() {
        assert_eq!(check_submission(20_000, 20_000, None), Ok(()));
    }

    #[test]
    fn test_submission_over_limit_reports_withdrawable() {
        assert_eq!(
            check_submission(20_001, 20_000, None),
            Err(WithdrawalError::InsufficientWithdrawable {
                requested: 20_001,
                withdrawable: 20_000
            })
        );
    }

    #[test]
    fn test_duplicate_pending_wins_over_amount_checks() {
        let pending = LedgerEntry::withdrawal_request("v1", 100);
        for amount in [1, 100, 1_000_000] {
            assert!(matches!(
                check_submission(amount, 0, Some(&pending)),
                Err(WithdrawalError::DuplicatePending { .. })
            ));
        }
    }

    #[test]
    fn test_non_positive_amount() {
        assert_eq!(
            check_submission(0, 1000, None),
            Err(WithdrawalError::NonPositiveAmount(0))
        );
    }

    #[test]
    fn test_pending_transitions_once() {
        let mut request = LedgerEntry::withdrawal_request("v1", 100);
        assert_eq!(
            transition(&request, Decision::Approve),
            Ok(EntryStatus::Approved)
        );
        assert_eq!(
            transition(&request, Decision::Reject),
            Ok(EntryStatus::Rejected)
        );

        request.status = EntryStatus::Approved;
        assert!(matches!(
            transition(&request, Decision::Reject),
            Err(WithdrawalError::InvalidTransition {
                from: EntryStatus::Approved,
                to: EntryStatus::Rejected,
                ..
            })
        ));
    }

    #[test]
    fn test_only_requests_transition() {
        let deposit = LedgerEntry::new("v1", EntryType::Deposit, 100);
        assert_eq!(
            transition(&deposit, Decision::Approve),
            Err(WithdrawalError::NotARequest(deposit.id))
        );
    }

    #[test]
    fn test_request_view_uses_positive_amount() {
        let mut entry = LedgerEntry::withdrawal_request("v1", 4_200);
        entry.status = EntryStatus::Rejected;
        entry.resolution_note = Some("bank details missing".into());
        let view = WithdrawalRequest::from_entry(&entry).unwrap();
        assert_eq!(view.amount, 4_200);
        assert_eq!(view.status, EntryStatus::Rejected);
        assert_eq!(view.resolution_note.as_deref(), Some("bank details missing"));

        let earning = LedgerEntry::new("v1", EntryType::Earning, 100);
        assert!(WithdrawalRequest::from_entry(&earning).is_none());
    }
}
