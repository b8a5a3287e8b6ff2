use std::{net::SocketAddr, time::Duration};

use anyhow::{Context, Result};

use crate::domain::{Paise, SettlementRates, WithdrawalPolicy};

/// Business constants of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Balance floor that is never withdrawable, applied to new wallets
    pub security_deposit: Paise,
    /// Travel charge used when a closed task does not state one
    pub traveling_amount: Paise,
    pub rates: SettlementRates,
    pub withdrawal_policy: WithdrawalPolicy,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            security_deposit: 500_000,
            traveling_amount: 10_000,
            rates: SettlementRates::default(),
            withdrawal_policy: WithdrawalPolicy::DoubleThreshold,
        }
    }
}

/// Process configuration, read from `VW_*` environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub request_timeout: Duration,
    /// Bearer token for the admin routes; admin routes are open when unset
    pub admin_token: Option<String>,
    pub log_json: bool,
    pub ledger: LedgerSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = LedgerSettings::default();

        let listen_addr: SocketAddr = lookup("VW_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid VW_LISTEN_ADDR")?;
        let db_path = lookup("VW_DB_PATH").unwrap_or_else(|| "vendor-wallet.db".into());
        let timeout_ms: u64 = parse_or("VW_REQUEST_TIMEOUT_MS", &lookup, 30_000)?;
        let admin_token = lookup("VW_ADMIN_TOKEN").filter(|t| !t.trim().is_empty());
        let log_json = lookup("VW_LOG_JSON")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let withdrawal_policy = match lookup("VW_WITHDRAWAL_POLICY") {
            Some(value) => WithdrawalPolicy::from_str(&value)
                .with_context(|| format!("Invalid VW_WITHDRAWAL_POLICY '{}'", value))?,
            None => defaults.withdrawal_policy,
        };

        let rates = SettlementRates {
            gst_rate_bps: parse_or("VW_GST_RATE_BPS", &lookup, defaults.rates.gst_rate_bps)?,
            cash_platform_share_bps: parse_or(
                "VW_CASH_PLATFORM_SHARE_BPS",
                &lookup,
                defaults.rates.cash_platform_share_bps,
            )?,
            online_vendor_share_bps: parse_or(
                "VW_ONLINE_VENDOR_SHARE_BPS",
                &lookup,
                defaults.rates.online_vendor_share_bps,
            )?,
        };
        rates.validate().context("Invalid settlement rates")?;

        let ledger = LedgerSettings {
            security_deposit: parse_or("VW_SECURITY_DEPOSIT", &lookup, defaults.security_deposit)?,
            traveling_amount: parse_or("VW_TRAVELING_AMOUNT", &lookup, defaults.traveling_amount)?,
            rates,
            withdrawal_policy,
        };
        if ledger.security_deposit < 0 || ledger.traveling_amount < 0 {
            anyhow::bail!("VW_SECURITY_DEPOSIT and VW_TRAVELING_AMOUNT must not be negative");
        }

        Ok(Self {
            listen_addr,
            db_path,
            request_timeout: Duration::from_millis(timeout_ms),
            admin_token,
            log_json,
            ledger,
        })
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} '{}'", key, value)),
        None => Ok(default),
    }
}
