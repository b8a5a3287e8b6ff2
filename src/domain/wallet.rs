use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Paise;

/// Vendor identity as issued by the onboarding system.
pub type VendorId = String;

/// A vendor's wallet row. Only `vendor_id` and `security_deposit` are
/// configuration; `cached_balance` is a denormalized copy of the ledger sum
/// and is never trusted over a reconciled value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub vendor_id: VendorId,
    pub security_deposit: Paise,
    pub cached_balance: Paise,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(vendor_id: impl Into<VendorId>, security_deposit: Paise) -> Self {
        Self {
            vendor_id: vendor_id.into(),
            security_deposit,
            cached_balance: 0,
            created_at: Utc::now(),
        }
    }
}

/// How the withdrawable amount is derived from the available balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalPolicy {
    /// The security deposit is subtracted twice: once to get the available
    /// balance and once more to get the withdrawable amount. Kept as the
    /// default until product confirms whether this is intended.
    #[default]
    DoubleThreshold,
    /// Everything above the security deposit is withdrawable.
    SingleThreshold,
}

impl WithdrawalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalPolicy::DoubleThreshold => "double_threshold",
            WithdrawalPolicy::SingleThreshold => "single_threshold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "double_threshold" | "double" => Some(WithdrawalPolicy::DoubleThreshold),
            "single_threshold" | "single" => Some(WithdrawalPolicy::SingleThreshold),
            _ => None,
        }
    }

    /// Returns `(available_balance, withdrawable_amount)` for a balance.
    pub fn limits(&self, current_balance: Paise, security_deposit: Paise) -> (Paise, Paise) {
        let available = current_balance.saturating_sub(security_deposit).max(0);
        let withdrawable = match self {
            WithdrawalPolicy::DoubleThreshold => available.saturating_sub(security_deposit).max(0),
            WithdrawalPolicy::SingleThreshold => available,
        };
        (available, withdrawable)
    }
}

impl std::fmt::Display for WithdrawalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
