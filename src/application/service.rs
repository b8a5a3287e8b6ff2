use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::LedgerSettings;
use crate::domain::{
    self, validate_new_entry, BalanceCheck, Decision, EntryId, EntryMetadata, EntryType,
    LedgerEntry, Paise, Settlement, TaskClosed, TaskId, Wallet, WalletSummary, WithdrawalRequest,
};
use crate::storage::{EntryFilter, IntegrityStats, Repository, SortOrder};

use super::{AppError, VendorLocks};

/// Application service providing every ledger operation. Mutations for one
/// vendor are serialized through [`VendorLocks`]. Reads take the lock only to
/// repair a drifted cached balance.
pub struct WalletService {
    repo: Repository,
    settings: LedgerSettings,
    locks: VendorLocks,
}

/// Result of writing one entry through an idempotency key
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResult {
    pub entry: LedgerEntry,
    /// True when the key had already been used and nothing new was written
    pub replayed: bool,
}

/// Result of settling a closed task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub settlement: Settlement,
    pub entries: Vec<LedgerEntry>,
    pub replayed: bool,
}

/// Wallet summary plus the most recent entries, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletView {
    pub vendor_id: String,
    pub summary: WalletSummary,
    pub recent_entries: Vec<LedgerEntry>,
}

/// Outcome of a reconciliation pass for one wallet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub vendor_id: String,
    pub check: BalanceCheck,
    /// True when the cached balance was rewritten from the ledger
    pub repaired: bool,
}

/// Ledger-wide integrity report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub wallet_count: i64,
    pub entry_count: i64,
    pub has_sequence_gaps: bool,
    pub orphan_entries: i64,
    pub zero_amounts: i64,
    pub sign_violations: i64,
    pub status_violations: i64,
    pub vendors_with_multiple_pending: i64,
    /// Wallets whose cached balance differs from the ledger
    pub inconsistent_wallets: Vec<ReconcileOutcome>,
}

impl IntegrityReport {
    fn new(stats: IntegrityStats, inconsistent_wallets: Vec<ReconcileOutcome>) -> Self {
        Self {
            wallet_count: stats.wallet_count,
            entry_count: stats.entry_count,
            has_sequence_gaps: stats.has_sequence_gaps,
            orphan_entries: stats.orphan_entries,
            zero_amounts: stats.zero_amounts,
            sign_violations: stats.sign_violations,
            status_violations: stats.status_violations,
            vendors_with_multiple_pending: stats.vendors_with_multiple_pending,
            inconsistent_wallets,
        }
    }

    pub fn is_healthy(&self) -> bool {
        !self.has_sequence_gaps
            && self.orphan_entries == 0
            && self.zero_amounts == 0
            && self.sign_violations == 0
            && self.status_violations == 0
            && self.vendors_with_multiple_pending == 0
            && self.inconsistent_wallets.is_empty()
    }
}

fn settlement_key(task_id: &str) -> String {
    format!("settlement:{task_id}")
}

fn deposit_key(gateway_reference: &str) -> String {
    format!("payment:{gateway_reference}")
}

impl WalletService {
    pub fn new(repo: Repository, settings: LedgerSettings) -> Self {
        Self {
            repo,
            settings,
            locks: VendorLocks::new(),
        }
    }

    /// Initialize (create and migrate) a database at the given path.
    pub async fn init(database_path: &str, settings: LedgerSettings) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, settings))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, settings: LedgerSettings) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, settings))
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    // ========================
    // Wallet operations
    // ========================

    /// Open a wallet at vendor onboarding.
    pub async fn open_wallet(&self, vendor_id: &str) -> Result<Wallet, AppError> {
        let vendor_id = vendor_id.trim();
        if vendor_id.is_empty() {
            return Err(AppError::validation("vendorId", "must not be empty"));
        }

        let _guard = self.locks.acquire(vendor_id).await;
        if self.repo.get_wallet(vendor_id).await?.is_some() {
            return Err(AppError::WalletAlreadyExists(vendor_id.to_string()));
        }

        let wallet = Wallet::new(vendor_id, self.settings.security_deposit);
        self.repo.save_wallet(&wallet).await?;
        info!(vendor_id, security_deposit = wallet.security_deposit, "wallet opened");
        Ok(wallet)
    }

    pub async fn get_wallet(&self, vendor_id: &str) -> Result<Wallet, AppError> {
        self.repo
            .get_wallet(vendor_id)
            .await?
            .ok_or_else(|| AppError::WalletNotFound(vendor_id.to_string()))
    }

    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, AppError> {
        Ok(self.repo.list_wallets().await?)
    }

    // ========================
    // Entry operations
    // ========================

    /// Validate and append an entry. The caller must hold the vendor's lock.
    /// An entry carrying an idempotency key that was already used returns the
    /// original entry instead of writing again.
    async fn append_locked(&self, mut entry: LedgerEntry) -> Result<EntryResult, AppError> {
        validate_new_entry(&entry)?;

        if let Some(key) = entry.idempotency_key.as_deref() {
            if let Some(existing) = self.repo.find_by_idempotency_key(&entry.vendor_id, key).await? {
                if existing.amount != entry.amount || existing.entry_type != entry.entry_type {
                    return Err(AppError::validation(
                        "idempotencyKey",
                        format!("key '{key}' was already used for a different entry"),
                    ));
                }
                info!(vendor_id = %entry.vendor_id, entry_id = %existing.id, key, "idempotent replay");
                return Ok(EntryResult {
                    entry: existing,
                    replayed: true,
                });
            }
        }

        // Both the cache and the ledger sum must stay representable
        let effect = entry.balance_effect();
        let wallet = self.get_wallet(&entry.vendor_id).await?;
        let reconciled = self.repo.ledger_balance(&entry.vendor_id).await?;
        if wallet.cached_balance.checked_add(effect).is_none()
            || reconciled.checked_add(effect).is_none()
        {
            warn!(vendor_id = %entry.vendor_id, amount = entry.amount, "entry would overflow balance");
            return Err(AppError::validation(
                "amount",
                "entry would overflow the wallet balance",
            ));
        }

        self.repo.append_entry(&mut entry).await?;
        info!(
            vendor_id = %entry.vendor_id,
            entry_id = %entry.id,
            entry_type = %entry.entry_type,
            amount = entry.amount,
            sequence = entry.sequence,
            "ledger entry appended"
        );
        Ok(EntryResult {
            entry,
            replayed: false,
        })
    }

    /// Record a confirmed payment from the gateway. The gateway reference is
    /// the idempotency key, so a repeated callback credits once.
    pub async fn record_deposit(
        &self,
        vendor_id: &str,
        amount: Paise,
        gateway_reference: Option<&str>,
    ) -> Result<EntryResult, AppError> {
        if amount <= 0 {
            return Err(AppError::validation("amount", "deposit must be positive"));
        }
        let _guard = self.locks.acquire(vendor_id).await;
        self.get_wallet(vendor_id).await?;

        let mut entry = LedgerEntry::new(vendor_id, EntryType::Deposit, amount);
        if let Some(reference) = gateway_reference {
            entry.metadata.gateway_reference = Some(reference.to_string());
            entry = entry.with_idempotency_key(deposit_key(reference));
        }
        self.append_locked(entry).await
    }

    /// Settle a closed task: compute GST or the cash deduction and append the
    /// result. A replayed event for the same task returns the original entries.
    pub async fn settle_task(&self, event: &TaskClosed) -> Result<SettlementResult, AppError> {
        let settlement = domain::settle(event, &self.settings.rates)?;

        let _guard = self.locks.acquire(&event.vendor_id).await;
        self.get_wallet(&event.vendor_id).await?;

        let key = settlement_key(&event.task_id);
        let mut entries = Vec::with_capacity(settlement.entries.len());
        let mut replayed = false;
        for entry in settlement.entries.iter().cloned() {
            let result = self
                .append_locked(entry.with_idempotency_key(key.clone()))
                .await?;
            replayed |= result.replayed;
            entries.push(result.entry);
        }

        info!(
            vendor_id = %event.vendor_id,
            task_id = %event.task_id,
            payment_method = %settlement.payment_method,
            gst_amount = settlement.gst_amount,
            wallet_delta = settlement.wallet_delta,
            replayed,
            "task settled"
        );
        Ok(SettlementResult {
            settlement,
            entries,
            replayed,
        })
    }

    /// Debit a penalty. `amount` is the positive magnitude.
    pub async fn record_penalty(
        &self,
        vendor_id: &str,
        amount: Paise,
        task_id: Option<TaskId>,
        reason: Option<String>,
    ) -> Result<LedgerEntry, AppError> {
        self.record_debit(vendor_id, EntryType::Penalty, amount, task_id, reason)
            .await
    }

    /// Debit the fee charged when a vendor accepts a task.
    pub async fn record_acceptance_fee(
        &self,
        vendor_id: &str,
        amount: Paise,
        task_id: TaskId,
    ) -> Result<LedgerEntry, AppError> {
        self.record_debit(
            vendor_id,
            EntryType::TaskAcceptanceFee,
            amount,
            Some(task_id),
            None,
        )
        .await
    }

    async fn record_debit(
        &self,
        vendor_id: &str,
        entry_type: EntryType,
        amount: Paise,
        task_id: Option<TaskId>,
        reason: Option<String>,
    ) -> Result<LedgerEntry, AppError> {
        if amount <= 0 {
            return Err(AppError::validation(
                "amount",
                format!("{entry_type} amount must be positive"),
            ));
        }
        let _guard = self.locks.acquire(vendor_id).await;
        self.get_wallet(vendor_id).await?;

        let mut entry = LedgerEntry::new(vendor_id, entry_type, -amount);
        if let Some(task_id) = task_id {
            entry = entry.with_task(task_id);
        }
        if let Some(reason) = reason {
            entry = entry.with_reason(reason);
        }
        Ok(self.append_locked(entry).await?.entry)
    }

    /// Record a signed administrative adjustment, optionally correcting an
    /// earlier entry of the same vendor.
    pub async fn record_adjustment(
        &self,
        vendor_id: &str,
        amount: Paise,
        corrects_entry_id: Option<EntryId>,
        reason: Option<String>,
    ) -> Result<LedgerEntry, AppError> {
        let _guard = self.locks.acquire(vendor_id).await;
        self.get_wallet(vendor_id).await?;

        let mut entry = LedgerEntry::new(vendor_id, EntryType::ManualAdjustment, amount);
        let mut metadata = EntryMetadata {
            reason,
            ..Default::default()
        };
        if let Some(original_id) = corrects_entry_id {
            let original = self
                .repo
                .get_entry(original_id)
                .await?
                .filter(|e| e.vendor_id == vendor_id)
                .ok_or_else(|| AppError::EntryNotFound(original_id.to_string()))?;
            metadata.corrects_entry_id = Some(original.id);
            if let Some(task_id) = original.related_task_id {
                entry = entry.with_task(task_id);
            }
        }

        Ok(self.append_locked(entry.with_metadata(metadata)).await?.entry)
    }

    pub async fn get_entry(&self, id: EntryId) -> Result<LedgerEntry, AppError> {
        self.repo
            .get_entry(id)
            .await?
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))
    }

    pub async fn list_entries(
        &self,
        vendor_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        self.get_wallet(vendor_id).await?;
        Ok(self.repo.list_entries(vendor_id, filter).await?)
    }

    // ========================
    // Withdrawal operations
    // ========================

    /// Submit a withdrawal request. The pending check, the withdrawable check
    /// and the write all happen under the vendor's lock.
    pub async fn submit_withdrawal(
        &self,
        vendor_id: &str,
        amount: Paise,
    ) -> Result<WithdrawalRequest, AppError> {
        let _guard = self.locks.acquire(vendor_id).await;
        let wallet = self.get_wallet(vendor_id).await?;

        let pending = self.repo.find_pending_withdrawal(vendor_id).await?;
        let summary = self.summarize_wallet(&wallet).await?;

        if let Err(err) =
            domain::check_submission(amount, summary.withdrawable_amount, pending.as_ref())
        {
            warn!(vendor_id, amount, error = %err, "withdrawal request refused");
            return Err(err.into());
        }

        let result = self
            .append_locked(LedgerEntry::withdrawal_request(vendor_id, amount))
            .await?;
        WithdrawalRequest::from_entry(&result.entry)
            .ok_or_else(|| AppError::EntryNotFound(result.entry.id.to_string()))
    }

    pub async fn approve_withdrawal(&self, id: EntryId) -> Result<WithdrawalRequest, AppError> {
        self.resolve_withdrawal(id, Decision::Approve, None).await
    }

    /// Reject a request. The reserved amount stops counting against the
    /// balance, leaving the vendor exactly where they were before submitting.
    pub async fn reject_withdrawal(
        &self,
        id: EntryId,
        note: Option<String>,
    ) -> Result<WithdrawalRequest, AppError> {
        self.resolve_withdrawal(id, Decision::Reject, note).await
    }

    async fn resolve_withdrawal(
        &self,
        id: EntryId,
        decision: Decision,
        note: Option<String>,
    ) -> Result<WithdrawalRequest, AppError> {
        let vendor_id = self.get_entry(id).await?.vendor_id;
        let _guard = self.locks.acquire(&vendor_id).await;

        // Re-read under the lock; the status may have moved meanwhile.
        let entry = self.get_entry(id).await?;
        let to = domain::transition(&entry, decision)?;

        let resolved_at = Utc::now();
        let moved = self
            .repo
            .transition_status(id, entry.status, to, resolved_at, note.as_deref())
            .await?;
        if !moved {
            let current = self.get_entry(id).await?;
            return Err(AppError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        info!(
            vendor_id = %vendor_id,
            request_id = %id,
            amount = -entry.amount,
            status = %to,
            "withdrawal request resolved"
        );

        let mut updated = entry;
        updated.status = to;
        updated.resolved_at = Some(resolved_at);
        updated.resolution_note = note;
        WithdrawalRequest::from_entry(&updated).ok_or_else(|| AppError::EntryNotFound(id.to_string()))
    }

    /// All of a vendor's withdrawal requests, newest first.
    pub async fn list_withdrawals(&self, vendor_id: &str) -> Result<Vec<WithdrawalRequest>, AppError> {
        let filter = EntryFilter {
            order: SortOrder::Descending,
            ..EntryFilter::of_type(EntryType::WithdrawalRequest)
        };
        let entries = self.list_entries(vendor_id, &filter).await?;
        Ok(entries.iter().filter_map(WithdrawalRequest::from_entry).collect())
    }

    pub async fn pending_withdrawal(
        &self,
        vendor_id: &str,
    ) -> Result<Option<WithdrawalRequest>, AppError> {
        self.get_wallet(vendor_id).await?;
        Ok(self
            .repo
            .find_pending_withdrawal(vendor_id)
            .await?
            .as_ref()
            .and_then(WithdrawalRequest::from_entry))
    }

    // ========================
    // Balance reconciliation
    // ========================

    async fn summarize_wallet(&self, wallet: &Wallet) -> Result<WalletSummary, AppError> {
        let entries = self
            .repo
            .list_entries(&wallet.vendor_id, &EntryFilter::default())
            .await?;
        Ok(domain::summarize(
            &entries,
            wallet.security_deposit,
            self.settings.withdrawal_policy,
        ))
    }

    /// Compute the wallet summary from the ledger. A cached balance that
    /// disagrees with it triggers [`WalletService::reconcile`], which
    /// re-checks under the vendor lock before rewriting the cache.
    pub async fn wallet_summary(&self, vendor_id: &str) -> Result<WalletSummary, AppError> {
        let wallet = self.get_wallet(vendor_id).await?;
        let summary = self.summarize_wallet(&wallet).await?;

        if wallet.cached_balance != summary.current_balance {
            warn!(
                vendor_id,
                cached = wallet.cached_balance,
                reconciled = summary.current_balance,
                "cached balance drift detected, reconciling"
            );
            self.reconcile(vendor_id).await?;
        }
        Ok(summary)
    }

    pub async fn wallet_view(&self, vendor_id: &str, recent: usize) -> Result<WalletView, AppError> {
        let summary = self.wallet_summary(vendor_id).await?;
        let recent_entries = self
            .repo
            .list_entries(vendor_id, &EntryFilter::recent(recent))
            .await?;
        Ok(WalletView {
            vendor_id: vendor_id.to_string(),
            summary,
            recent_entries,
        })
    }

    /// Compare the cached balance with the ledger and rewrite the cache from
    /// the ledger when they differ.
    pub async fn reconcile(&self, vendor_id: &str) -> Result<ReconcileOutcome, AppError> {
        let _guard = self.locks.acquire(vendor_id).await;
        let wallet = self.get_wallet(vendor_id).await?;
        let entries = self
            .repo
            .list_entries(vendor_id, &EntryFilter::default())
            .await?;

        let check = BalanceCheck {
            cached: wallet.cached_balance,
            reconciled: domain::compute_balance(&entries),
        };

        let repaired = !check.is_consistent();
        if repaired {
            let err = AppError::Consistency {
                vendor_id: vendor_id.to_string(),
                cached: check.cached,
                reconciled: check.reconciled,
            };
            error!(vendor_id, drift = check.drift(), error = %err, "rewriting cached balance from ledger");
            self.repo
                .set_cached_balance(vendor_id, check.reconciled)
                .await?;
        }

        Ok(ReconcileOutcome {
            vendor_id: vendor_id.to_string(),
            check,
            repaired,
        })
    }

    /// Run [`WalletService::reconcile`] over every wallet.
    pub async fn reconcile_all(&self) -> Result<Vec<ReconcileOutcome>, AppError> {
        let mut outcomes = Vec::new();
        for wallet in self.repo.list_wallets().await? {
            outcomes.push(self.reconcile(&wallet.vendor_id).await?);
        }
        Ok(outcomes)
    }

    /// Check ledger integrity without modifying anything.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;

        let mut inconsistent = Vec::new();
        for wallet in self.repo.list_wallets().await? {
            let entries = self
                .repo
                .list_entries(&wallet.vendor_id, &EntryFilter::default())
                .await?;
            let check = BalanceCheck {
                cached: wallet.cached_balance,
                reconciled: domain::compute_balance(&entries),
            };
            if !check.is_consistent() {
                inconsistent.push(ReconcileOutcome {
                    vendor_id: wallet.vendor_id,
                    check,
                    repaired: false,
                });
            }
        }

        let report = IntegrityReport::new(stats, inconsistent);
        if !report.is_healthy() {
            warn!(
                inconsistent_wallets = report.inconsistent_wallets.len(),
                "ledger integrity check failed"
            );
        }
        Ok(report)
    }

    /// Raw repository access for tooling and tests.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}
