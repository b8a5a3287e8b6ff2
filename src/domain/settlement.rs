//! Money movements at task closure.
//!
//! Online payments are collected by the platform, so the vendor is credited
//! with an `earning`. Cash payments are collected by the vendor, so the
//! platform's share is debited back as a `cash_collection`. GST only ever
//! applies on the online path.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    apply_bps, EntryMetadata, EntryType, LedgerEntry, Paise, PaymentMethod, TaskId, VendorId,
    FULL_BPS,
};

/// Rates used by the calculator, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRates {
    /// GST on the pre-tax billing amount (1800 = 18%)
    pub gst_rate_bps: i64,
    /// Platform share of the service margin on cash jobs (5000 = 50%)
    pub cash_platform_share_bps: i64,
    /// Vendor share of the billing total on online jobs (10000 = 100%)
    pub online_vendor_share_bps: i64,
}

impl Default for SettlementRates {
    fn default() -> Self {
        Self {
            gst_rate_bps: 1800,
            cash_platform_share_bps: 5000,
            online_vendor_share_bps: FULL_BPS,
        }
    }
}

impl SettlementRates {
    pub fn validate(&self) -> Result<(), SettlementError> {
        for (field, bps) in [
            ("gst_rate_bps", self.gst_rate_bps),
            ("cash_platform_share_bps", self.cash_platform_share_bps),
            ("online_vendor_share_bps", self.online_vendor_share_bps),
        ] {
            if !(0..=FULL_BPS).contains(&bps) {
                return Err(SettlementError::Validation {
                    field,
                    message: format!("rate must be between 0 and {FULL_BPS} basis points"),
                });
            }
        }
        if self.online_vendor_share_bps == 0 {
            return Err(SettlementError::Validation {
                field: "online_vendor_share_bps",
                message: "online vendor share must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Event published by the task subsystem when a task is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskClosed {
    pub task_id: TaskId,
    pub vendor_id: VendorId,
    /// Pre-tax amount billed for the job
    pub billing_amount: Paise,
    /// Sum of itemized spare-part costs
    #[serde(default)]
    pub spare_parts_total: Paise,
    pub traveling_amount: Paise,
    /// Booking charge collected earlier, may be zero
    #[serde(default)]
    pub booking_amount: Paise,
    #[serde(default)]
    pub gst_included: bool,
    pub payment_method: PaymentMethod,
}

/// Figures computed for a closed task, plus the entries to append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub task_id: TaskId,
    pub vendor_id: VendorId,
    pub payment_method: PaymentMethod,
    /// Effective GST flag after the cash override
    pub gst_included: bool,
    pub gst_amount: Paise,
    pub billing_total: Paise,
    /// Cash path only
    pub gross_before_split: Option<Paise>,
    /// Signed amount the vendor's wallet moves by
    pub wallet_delta: Paise,
    #[serde(skip)]
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("billing amount must be positive, got {0}")]
    InvalidAmount(Paise),
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
}

/// GST charged on a pre-tax amount.
pub fn gst_amount(billing_amount: Paise, rates: &SettlementRates) -> Paise {
    apply_bps(billing_amount, rates.gst_rate_bps)
}

/// Amount the vendor owes the platform after collecting cash.
/// Returns `(gross_before_split, deduction)`; the deduction is positive.
pub fn cash_deduction(
    billing_amount: Paise,
    spare_parts_total: Paise,
    traveling_amount: Paise,
    rates: &SettlementRates,
) -> Result<(Paise, Paise), SettlementError> {
    let gross_before_split = billing_amount
        .checked_sub(spare_parts_total)
        .and_then(|gross| gross.checked_sub(traveling_amount))
        .ok_or_else(|| too_large("spare_parts_total"))?;
    let platform_margin = apply_bps(gross_before_split.max(0), rates.cash_platform_share_bps);
    let deduction = platform_margin
        .checked_add(spare_parts_total)
        .and_then(|total| total.checked_add(traveling_amount))
        .ok_or_else(|| too_large("spare_parts_total"))?;
    Ok((gross_before_split, deduction))
}

fn too_large(field: &'static str) -> SettlementError {
    SettlementError::Validation {
        field,
        message: "amount too large".to_string(),
    }
}

/// Compute the settlement for a closed task. Pure: the caller appends the
/// returned entries.
pub fn settle(event: &TaskClosed, rates: &SettlementRates) -> Result<Settlement, SettlementError> {
    if event.billing_amount <= 0 {
        return Err(SettlementError::InvalidAmount(event.billing_amount));
    }
    for (field, value) in [
        ("spare_parts_total", event.spare_parts_total),
        ("traveling_amount", event.traveling_amount),
        ("booking_amount", event.booking_amount),
    ] {
        if value < 0 {
            return Err(SettlementError::Validation {
                field,
                message: format!("must not be negative, got {value}"),
            });
        }
    }

    let gst_included = event.gst_included && event.payment_method == PaymentMethod::Online;
    let gst = if gst_included {
        gst_amount(event.billing_amount, rates)
    } else {
        0
    };
    let billing_total = event
        .billing_amount
        .checked_add(gst)
        .ok_or_else(|| too_large("billing_amount"))?;

    let mut metadata = EntryMetadata {
        payment_method: Some(event.payment_method),
        base_amount: Some(event.billing_amount),
        billing_total: Some(billing_total),
        spare_parts_total: Some(event.spare_parts_total),
        traveling_amount: Some(event.traveling_amount),
        booking_amount: Some(event.booking_amount),
        ..Default::default()
    };

    let (entry, gross_before_split) = match event.payment_method {
        PaymentMethod::Online => {
            metadata.gst_amount = Some(gst);
            let earning = apply_bps(billing_total, rates.online_vendor_share_bps);
            metadata.platform_share = Some(billing_total - earning);
            (
                LedgerEntry::new(event.vendor_id.clone(), EntryType::Earning, earning),
                None,
            )
        }
        PaymentMethod::Cash => {
            let (gross, deduction) = cash_deduction(
                event.billing_amount,
                event.spare_parts_total,
                event.traveling_amount,
                rates,
            )?;
            metadata.gross_before_split = Some(gross);
            metadata.platform_share = Some(deduction);
            (
                LedgerEntry::new(event.vendor_id.clone(), EntryType::CashCollection, -deduction),
                Some(gross),
            )
        }
    };

    let entry = entry
        .with_task(event.task_id.clone())
        .with_metadata(metadata);
    let wallet_delta = entry.amount;
    // A zero movement (e.g. a 0% platform share on a cash job with no costs)
    // leaves nothing to record.
    let entries = if wallet_delta == 0 { Vec::new() } else { vec![entry] };

    Ok(Settlement {
        task_id: event.task_id.clone(),
        vendor_id: event.vendor_id.clone(),
        payment_method: event.payment_method,
        gst_included,
        gst_amount: gst,
        billing_total,
        gross_before_split,
        wallet_delta,
        entries,
    })
}
