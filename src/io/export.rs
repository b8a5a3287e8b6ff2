use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::WalletService;
use crate::domain::{LedgerEntry, Wallet, WalletSummary};
use crate::storage::EntryFilter;

/// JSON export of one vendor's wallet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorStatement {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub wallet: Wallet,
    pub summary: WalletSummary,
    pub entries: Vec<LedgerEntry>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a WalletService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a WalletService) -> Self {
        Self { service }
    }

    /// Export a vendor's entries to CSV, oldest first
    pub async fn export_entries_csv<W: Write>(&self, vendor_id: &str, writer: W) -> Result<usize> {
        let entries = self
            .service
            .list_entries(vendor_id, &EntryFilter::default())
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "sequence",
            "created_at",
            "entry_type",
            "amount",
            "status",
            "related_task_id",
            "resolved_at",
            "resolution_note",
            "metadata",
        ])?;

        for entry in &entries {
            let metadata = if entry.metadata.is_empty() {
                String::new()
            } else {
                serde_json::to_string(&entry.metadata)?
            };
            csv_writer.write_record([
                entry.id.to_string(),
                entry.sequence.to_string(),
                entry.created_at.to_rfc3339(),
                entry.entry_type.as_str().to_string(),
                entry.amount.to_string(),
                entry.status.as_str().to_string(),
                entry.related_task_id.clone().unwrap_or_default(),
                entry
                    .resolved_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_default(),
                entry.resolution_note.clone().unwrap_or_default(),
                metadata,
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }

    /// Export every wallet with its cached balance to CSV
    pub async fn export_wallets_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let wallets = self.service.list_wallets().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["vendor_id", "security_deposit", "cached_balance", "created_at"])?;
        for wallet in &wallets {
            csv_writer.write_record([
                wallet.vendor_id.clone(),
                wallet.security_deposit.to_string(),
                wallet.cached_balance.to_string(),
                wallet.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(wallets.len())
    }

    /// Export a vendor's wallet, summary and entries as one JSON document
    pub async fn export_statement_json<W: Write>(
        &self,
        vendor_id: &str,
        mut writer: W,
    ) -> Result<VendorStatement> {
        let wallet = self.service.get_wallet(vendor_id).await?;
        let summary = self.service.wallet_summary(vendor_id).await?;
        let entries = self
            .service
            .list_entries(vendor_id, &EntryFilter::default())
            .await?;

        let statement = VendorStatement {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            wallet,
            summary,
            entries,
        };

        let json = serde_json::to_string_pretty(&statement)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(statement)
    }
}
