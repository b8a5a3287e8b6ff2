// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use tempfile::TempDir;
use vendor_wallet::application::WalletService;
use vendor_wallet::config::LedgerSettings;
use vendor_wallet::domain::{Paise, PaymentMethod, TaskClosed, WithdrawalPolicy};

/// Default security deposit, 5000.00
pub const DEPOSIT: Paise = 500_000;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(WalletService, TempDir)> {
    test_service_with(LedgerSettings::default()).await
}

pub async fn test_service_with(settings: LedgerSettings) -> Result<(WalletService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = WalletService::init(db_path.to_str().unwrap(), settings).await?;
    Ok((service, temp_dir))
}

/// Settings where everything above the security deposit is withdrawable
pub fn single_threshold() -> LedgerSettings {
    LedgerSettings {
        withdrawal_policy: WithdrawalPolicy::SingleThreshold,
        ..LedgerSettings::default()
    }
}

/// Open a wallet and pay in the security deposit
pub async fn onboard(service: &WalletService, vendor_id: &str) -> Result<()> {
    service.open_wallet(vendor_id).await?;
    service
        .record_deposit(vendor_id, DEPOSIT, Some(&format!("pay-{vendor_id}-initial")))
        .await?;
    Ok(())
}

/// A closed task without spare parts, travel or GST
pub fn task(vendor_id: &str, task_id: &str, billing: Paise, method: PaymentMethod) -> TaskClosed {
    TaskClosed {
        task_id: task_id.to_string(),
        vendor_id: vendor_id.to_string(),
        billing_amount: billing,
        spare_parts_total: 0,
        traveling_amount: 0,
        booking_amount: 0,
        gst_included: false,
        payment_method: method,
    }
}

/// Credit an online earning of exactly `amount`
pub async fn earn(service: &WalletService, vendor_id: &str, task_id: &str, amount: Paise) -> Result<()> {
    service
        .settle_task(&task(vendor_id, task_id, amount, PaymentMethod::Online))
        .await?;
    Ok(())
}
