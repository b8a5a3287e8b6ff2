use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::api::{app_router, AppState};
use crate::application::{ReconcileOutcome, WalletService};
use crate::config::Config;
use crate::domain::{
    format_paise, parse_paise, EntryStatus, EntryType, LedgerEntry, Paise, PaymentMethod,
    Settlement, TaskClosed,
};
use crate::storage::{EntryFilter, SortOrder};
use crate::telemetry::init_tracing;

/// Vendor Wallet - ledger and settlement engine for marketplace vendors
#[derive(Parser)]
#[command(name = "vendor-wallet")]
#[command(about = "Append-only vendor wallet ledger with task settlement and withdrawals")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides VW_DB_PATH)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP API
    Serve {
        /// Listen address (overrides VW_LISTEN_ADDR)
        #[arg(long)]
        listen: Option<std::net::SocketAddr>,
    },

    /// Wallet management commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Record a confirmed payment into a vendor's wallet
    Deposit {
        vendor: String,

        /// Amount (e.g., "5000.00" or "5000")
        amount: String,

        /// Payment gateway reference, used as the idempotency key
        #[arg(long)]
        reference: Option<String>,
    },

    /// Settle a closed task
    CloseTask {
        vendor: String,

        task_id: String,

        /// Pre-tax billing amount
        #[arg(long)]
        billing: String,

        /// Payment method: online, cash
        #[arg(short, long)]
        method: String,

        /// Total of spare parts used
        #[arg(long, default_value = "0")]
        spares: String,

        /// Travel charge (defaults to VW_TRAVELING_AMOUNT)
        #[arg(long)]
        travel: Option<String>,

        /// Booking charge collected upfront
        #[arg(long, default_value = "0")]
        booking: String,

        /// Add GST to the bill (online payments only)
        #[arg(long)]
        gst: bool,
    },

    /// Submit a withdrawal request
    Withdraw { vendor: String, amount: String },

    /// Approve a pending withdrawal request
    Approve {
        /// Withdrawal request ID
        id: String,
    },

    /// Reject a pending withdrawal request
    Reject {
        /// Withdrawal request ID
        id: String,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Debit a penalty
    Penalty {
        vendor: String,

        /// Positive amount to debit
        amount: String,

        #[arg(long)]
        task: Option<String>,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Debit a task acceptance fee
    Fee {
        vendor: String,

        /// Positive amount to debit
        amount: String,

        #[arg(long)]
        task: String,
    },

    /// Record a signed manual adjustment
    Adjust {
        vendor: String,

        /// Signed amount, e.g. "-25.00" for a debit
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// ID of the entry this adjustment corrects
        #[arg(long)]
        corrects: Option<String>,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// List a vendor's ledger entries
    Entries {
        vendor: String,

        /// Filter by type (e.g., earning, withdrawal_request)
        #[arg(short = 't', long = "type")]
        entry_type: Option<String>,

        /// Filter by status: completed, pending, approved, rejected
        #[arg(long)]
        status: Option<String>,

        /// Filter by related task
        #[arg(long)]
        task: Option<String>,

        /// Maximum number of entries (most recent first)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Rewrite cached balances from the ledger (all wallets if omitted)
    Reconcile { vendor: Option<String> },

    /// Verify ledger integrity without modifying anything
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: entries, wallets, statement
        export_type: String,

        /// Vendor for entries and statement exports
        #[arg(long)]
        vendor: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format for entries: csv, json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Open a wallet for a newly onboarded vendor
    Open { vendor: String },

    /// List all wallets
    List,

    /// Show a wallet summary and its recent entries
    Show {
        vendor: String,

        /// Number of recent entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(database) = &self.database {
            config.db_path = database.clone();
        }
        Ok(config)
    }

    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        let default_level = match (&self.command, self.verbose) {
            (_, true) => "debug",
            (Commands::Serve { .. }, false) => "info",
            _ => "warn",
        };
        init_tracing(config.log_json, default_level);

        match self.command {
            Commands::Init => {
                WalletService::init(&config.db_path, config.ledger).await?;
                println!("Database initialized: {}", config.db_path);
            }

            Commands::Serve { listen } => {
                let mut config = config;
                if let Some(addr) = listen {
                    config.listen_addr = addr;
                }
                run_serve_command(config).await?;
            }

            Commands::Wallet(wallet_cmd) => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                run_wallet_command(&service, wallet_cmd).await?;
            }

            Commands::Deposit {
                vendor,
                amount,
                reference,
            } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let amount = parse_amount(&amount)?;
                let result = service
                    .record_deposit(&vendor, amount, reference.as_deref())
                    .await?;
                if result.replayed {
                    println!(
                        "Deposit already recorded: {} ({})",
                        format_paise(result.entry.amount),
                        result.entry.id
                    );
                } else {
                    println!(
                        "Recorded deposit: {} -> {} ({})",
                        format_paise(result.entry.amount),
                        vendor,
                        result.entry.id
                    );
                }
            }

            Commands::CloseTask {
                vendor,
                task_id,
                billing,
                method,
                spares,
                travel,
                booking,
                gst,
            } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let payment_method = PaymentMethod::from_str(&method).with_context(|| {
                    format!("Invalid payment method '{}'. Valid methods: online, cash", method)
                })?;
                let traveling_amount = match travel {
                    Some(travel) => parse_amount(&travel)?,
                    None => service.settings().traveling_amount,
                };
                let event = TaskClosed {
                    task_id,
                    vendor_id: vendor,
                    billing_amount: parse_amount(&billing)?,
                    spare_parts_total: parse_amount(&spares)?,
                    traveling_amount,
                    booking_amount: parse_amount(&booking)?,
                    gst_included: gst,
                    payment_method,
                };
                run_close_task_command(&service, &event).await?;
            }

            Commands::Withdraw { vendor, amount } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let request = service
                    .submit_withdrawal(&vendor, parse_amount(&amount)?)
                    .await?;
                println!(
                    "Withdrawal requested: {} ({})",
                    format_paise(request.amount),
                    request.id
                );
            }

            Commands::Approve { id } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let request = service.approve_withdrawal(parse_id(&id)?).await?;
                println!(
                    "Approved withdrawal of {} for {}",
                    format_paise(request.amount),
                    request.vendor_id
                );
            }

            Commands::Reject { id, reason } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let request = service.reject_withdrawal(parse_id(&id)?, reason).await?;
                println!(
                    "Rejected withdrawal of {} for {}",
                    format_paise(request.amount),
                    request.vendor_id
                );
            }

            Commands::Penalty {
                vendor,
                amount,
                task,
                reason,
            } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let entry = service
                    .record_penalty(&vendor, parse_amount(&amount)?, task, reason)
                    .await?;
                print_recorded(&entry);
            }

            Commands::Fee {
                vendor,
                amount,
                task,
            } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let entry = service
                    .record_acceptance_fee(&vendor, parse_amount(&amount)?, task)
                    .await?;
                print_recorded(&entry);
            }

            Commands::Adjust {
                vendor,
                amount,
                corrects,
                reason,
            } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let corrects = corrects.as_deref().map(parse_id).transpose()?;
                let entry = service
                    .record_adjustment(&vendor, parse_amount(&amount)?, corrects, reason)
                    .await?;
                print_recorded(&entry);
            }

            Commands::Entries {
                vendor,
                entry_type,
                status,
                task,
                limit,
            } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let filter = EntryFilter {
                    entry_type: entry_type
                        .as_deref()
                        .map(|t| {
                            EntryType::from_str(t)
                                .with_context(|| format!("Invalid entry type '{}'", t))
                        })
                        .transpose()?,
                    status: status
                        .as_deref()
                        .map(|s| {
                            EntryStatus::from_str(s)
                                .with_context(|| format!("Invalid status '{}'", s))
                        })
                        .transpose()?,
                    related_task_id: task,
                    order: SortOrder::Descending,
                    limit,
                };
                let entries = service.list_entries(&vendor, &filter).await?;
                print_entries(&entries);
            }

            Commands::Reconcile { vendor } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                let outcomes = match vendor {
                    Some(vendor) => vec![service.reconcile(&vendor).await?],
                    None => service.reconcile_all().await?,
                };
                print_reconcile(&outcomes);
            }

            Commands::Check => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                vendor,
                output,
                format,
            } => {
                let service = WalletService::connect(&config.db_path, config.ledger).await?;
                run_export_command(
                    &service,
                    &export_type,
                    vendor.as_deref(),
                    output.as_deref(),
                    &format,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_serve_command(config: Config) -> Result<()> {
    let service = WalletService::init(&config.db_path, config.ledger).await?;
    let state = AppState::new(service, &config);
    let app = app_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, db_path = %config.db_path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn run_wallet_command(service: &WalletService, cmd: WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::Open { vendor } => {
            let wallet = service.open_wallet(&vendor).await?;
            println!(
                "Opened wallet: {} (security deposit {})",
                wallet.vendor_id,
                format_paise(wallet.security_deposit)
            );
        }

        WalletCommands::List => {
            let wallets = service.list_wallets().await?;
            if wallets.is_empty() {
                println!("No wallets found.");
            } else {
                println!("{:<24} {:>14} {:>14}", "VENDOR", "BALANCE", "DEPOSIT");
                println!("{}", "-".repeat(54));
                for wallet in wallets {
                    println!(
                        "{:<24} {:>14} {:>14}",
                        truncate(&wallet.vendor_id, 24),
                        format_paise(wallet.cached_balance),
                        format_paise(wallet.security_deposit)
                    );
                }
            }
        }

        WalletCommands::Show { vendor, limit } => {
            let view = service.wallet_view(&vendor, limit).await?;
            let summary = &view.summary;

            println!("Wallet: {}", view.vendor_id);
            println!("  Current balance:   {}", format_paise(summary.current_balance));
            println!("  Available:         {}", format_paise(summary.available_balance));
            println!("  Withdrawable:      {}", format_paise(summary.withdrawable_amount));
            println!("  Security deposit:  {}", format_paise(summary.security_deposit));
            println!(
                "  Initial deposit:   {}",
                if summary.has_initial_deposit { "yes" } else { "no" }
            );
            if summary.pending_withdrawal > 0 {
                println!(
                    "  Pending request:   {}",
                    format_paise(summary.pending_withdrawal)
                );
            }
            println!();
            println!("  Deposits:          {}", format_paise(summary.total_deposits));
            println!("  Earnings:          {}", format_paise(summary.total_earnings));
            println!("  Cash collections:  {}", format_paise(summary.total_cash_collections));
            println!("  Penalties:         {}", format_paise(summary.total_penalties));
            println!("  Fees:              {}", format_paise(summary.total_fees));
            println!("  Withdrawals:       {}", format_paise(summary.total_withdrawals));
            println!("  Adjustments:       {}", format_paise(summary.total_adjustments));
            println!("  Entries:           {}", summary.entry_count);

            if !view.recent_entries.is_empty() {
                println!();
                print_entries(&view.recent_entries);
            }
        }
    }
    Ok(())
}

async fn run_close_task_command(service: &WalletService, event: &TaskClosed) -> Result<()> {
    let result = service.settle_task(event).await?;
    let settlement = &result.settlement;

    if result.replayed {
        println!("Task {} was already settled.", settlement.task_id);
    } else {
        println!("Settled task {} ({})", settlement.task_id, settlement.payment_method);
    }
    for line in settlement_lines(settlement) {
        println!("  {line}");
    }
    Ok(())
}

fn settlement_lines(settlement: &Settlement) -> Vec<String> {
    let mut lines = vec![format!(
        "Billing total:      {}",
        format_paise(settlement.billing_total)
    )];
    if settlement.gst_included {
        lines.push(format!("GST:                {}", format_paise(settlement.gst_amount)));
    }
    // Billing minus spare parts and travel, the amount the platform share applies to
    if let Some(gross) = settlement.gross_before_split {
        lines.push(format!("Gross before split: {}", format_paise(gross)));
    }
    lines.push(format!(
        "Wallet change:      {}",
        format_paise(settlement.wallet_delta)
    ));
    lines
}

async fn run_check_command(service: &WalletService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Wallets: {}", report.wallet_count);
    println!("Entries: {}", report.entry_count);
    println!();

    let mut issues = Vec::new();
    if report.has_sequence_gaps {
        issues.push("entry sequence has gaps".to_string());
    }
    if report.orphan_entries > 0 {
        issues.push(format!("{} entries without a wallet", report.orphan_entries));
    }
    if report.zero_amounts > 0 {
        issues.push(format!("{} zero-amount entries", report.zero_amounts));
    }
    if report.sign_violations > 0 {
        issues.push(format!("{} entries with the wrong sign", report.sign_violations));
    }
    if report.status_violations > 0 {
        issues.push(format!("{} entries with an invalid status", report.status_violations));
    }
    if report.vendors_with_multiple_pending > 0 {
        issues.push(format!(
            "{} vendors with more than one pending withdrawal",
            report.vendors_with_multiple_pending
        ));
    }
    for outcome in &report.inconsistent_wallets {
        issues.push(format!(
            "{}: cached {} but ledger says {}",
            outcome.vendor_id,
            format_paise(outcome.check.cached),
            format_paise(outcome.check.reconciled)
        ));
    }

    if issues.is_empty() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &WalletService,
    export_type: &str,
    vendor: Option<&str>,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };
    let require_vendor = || vendor.context("--vendor is required for this export");

    match (export_type, format) {
        ("entries", "csv") => {
            let count = exporter.export_entries_csv(require_vendor()?, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} entries", count);
            }
        }
        ("entries", "json") | ("statement", _) => {
            let statement = exporter
                .export_statement_json(require_vendor()?, writer)
                .await?;
            if output.is_some() {
                eprintln!(
                    "Exported statement for {}: {} entries",
                    statement.wallet.vendor_id,
                    statement.entries.len()
                );
            }
        }
        ("wallets", _) => {
            let count = exporter.export_wallets_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} wallets", count);
            }
        }
        ("entries", other) => {
            anyhow::bail!("Invalid format '{}'. Valid formats: csv, json", other);
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: entries, wallets, statement",
                export_type
            );
        }
    }

    Ok(())
}

fn print_recorded(entry: &LedgerEntry) {
    println!(
        "Recorded {}: {} for {} ({})",
        entry.entry_type,
        format_paise(entry.amount),
        entry.vendor_id,
        entry.id
    );
}

fn print_entries(entries: &[LedgerEntry]) {
    if entries.is_empty() {
        println!("No entries found.");
        return;
    }

    println!(
        "{:<12} {:<20} {:>12} {:<10} {:<14} ID",
        "DATE", "TYPE", "AMOUNT", "STATUS", "TASK"
    );
    println!("{}", "-".repeat(108));
    for entry in entries {
        println!(
            "{:<12} {:<20} {:>12} {:<10} {:<14} {}",
            entry.created_at.format("%Y-%m-%d"),
            entry.entry_type.as_str(),
            format_paise(entry.amount),
            entry.status.as_str(),
            truncate(entry.related_task_id.as_deref().unwrap_or(""), 14),
            entry.id
        );
    }
}

fn print_reconcile(outcomes: &[ReconcileOutcome]) {
    if outcomes.is_empty() {
        println!("No wallets found.");
        return;
    }
    let repaired = outcomes.iter().filter(|o| o.repaired).count();
    for outcome in outcomes.iter().filter(|o| o.repaired) {
        println!(
            "Repaired {}: {} -> {}",
            outcome.vendor_id,
            format_paise(outcome.check.cached),
            format_paise(outcome.check.reconciled)
        );
    }
    println!(
        "Reconciled {} wallet(s), {} repaired.",
        outcomes.len(),
        repaired
    );
}

fn parse_amount(input: &str) -> Result<Paise> {
    parse_paise(input)
        .with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", input))
}

fn parse_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).with_context(|| format!("Invalid ID '{}'", input))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
