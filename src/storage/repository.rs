use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    EntryId, EntryMetadata, EntryStatus, EntryType, LedgerEntry, Paise, Wallet,
};

use super::MIGRATION_001_INITIAL;

const ENTRY_COLUMNS: &str = "id, sequence, vendor_id, entry_type, amount, related_task_id, status, metadata, idempotency_key, created_at, resolved_at, resolution_note";

/// Ordering for entry listings: ascending for computation, descending for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filter for querying a vendor's entries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub entry_type: Option<EntryType>,
    pub status: Option<EntryStatus>,
    pub related_task_id: Option<String>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl EntryFilter {
    /// Most recent entries first.
    pub fn recent(limit: usize) -> Self {
        Self {
            order: SortOrder::Descending,
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn of_type(entry_type: EntryType) -> Self {
        Self {
            entry_type: Some(entry_type),
            ..Default::default()
        }
    }
}

/// Statistics for ledger integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub wallet_count: i64,
    pub entry_count: i64,
    pub has_sequence_gaps: bool,
    pub orphan_entries: i64,
    pub zero_amounts: i64,
    pub sign_violations: i64,
    pub status_violations: i64,
    pub vendors_with_multiple_pending: i64,
}

/// Repository for persisting and querying wallets and ledger entries.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Wallet operations
    // ========================

    pub async fn save_wallet(&self, wallet: &Wallet) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (vendor_id, security_deposit, cached_balance, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&wallet.vendor_id)
        .bind(wallet.security_deposit)
        .bind(wallet.cached_balance)
        .bind(wallet.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save wallet")?;
        Ok(())
    }

    pub async fn get_wallet(&self, vendor_id: &str) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            SELECT vendor_id, security_deposit, cached_balance, created_at
            FROM wallets
            WHERE vendor_id = ?
            "#,
        )
        .bind(vendor_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch wallet")?;

        row.as_ref().map(Self::row_to_wallet).transpose()
    }

    pub async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let rows = sqlx::query(
            "SELECT vendor_id, security_deposit, cached_balance, created_at FROM wallets ORDER BY vendor_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list wallets")?;

        rows.iter().map(Self::row_to_wallet).collect()
    }

    /// Overwrite the cached balance. Only reconciliation calls this, always
    /// with a value computed from the ledger.
    pub async fn set_cached_balance(&self, vendor_id: &str, balance: Paise) -> Result<()> {
        sqlx::query("UPDATE wallets SET cached_balance = ? WHERE vendor_id = ?")
            .bind(balance)
            .bind(vendor_id)
            .execute(&self.pool)
            .await
            .context("Failed to update cached balance")?;
        Ok(())
    }

    /// Sum of a vendor's entries that count toward the balance, computed by
    /// the database from the ledger rows.
    pub async fn ledger_balance(&self, vendor_id: &str) -> Result<Paise> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS balance FROM ledger_entries WHERE vendor_id = ? AND status != 'rejected'",
        )
        .bind(vendor_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum ledger entries")?;
        Ok(row.try_get("balance")?)
    }

    fn row_to_wallet(row: &sqlx::sqlite::SqliteRow) -> Result<Wallet> {
        let created_at_str: String = row.get("created_at");

        Ok(Wallet {
            vendor_id: row.get("vendor_id"),
            security_deposit: row.get("security_deposit"),
            cached_balance: row
                .try_get("cached_balance")
                .context("Invalid cached_balance")?,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    // ========================
    // Entry operations
    // ========================

    /// Append a single entry. See [`Repository::append_entries`].
    pub async fn append_entry(&self, entry: &mut LedgerEntry) -> Result<EntryId> {
        self.append_entries(std::slice::from_mut(entry)).await?;
        Ok(entry.id)
    }

    /// Append entries in one transaction: each gets the next sequence number,
    /// and the owning wallet's cached balance moves by the same amount. Either
    /// every entry is written or none is.
    pub async fn append_entries(&self, entries: &mut [LedgerEntry]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        for entry in entries.iter_mut() {
            let row = sqlx::query(
                r#"
                UPDATE sequence_counter
                SET value = value + 1
                WHERE name = 'entry_sequence'
                RETURNING value
                "#,
            )
            .fetch_one(&mut *tx)
            .await
            .context("Failed to get next sequence number")?;
            entry.sequence = row.get("value");

            let metadata_json = serde_json::to_string(&entry.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO ledger_entries (id, sequence, vendor_id, entry_type, amount, related_task_id, status, metadata, idempotency_key, created_at, resolved_at, resolution_note)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.id.to_string())
            .bind(entry.sequence)
            .bind(&entry.vendor_id)
            .bind(entry.entry_type.as_str())
            .bind(entry.amount)
            .bind(&entry.related_task_id)
            .bind(entry.status.as_str())
            .bind(&metadata_json)
            .bind(&entry.idempotency_key)
            .bind(entry.created_at.to_rfc3339())
            .bind(entry.resolved_at.map(|dt| dt.to_rfc3339()))
            .bind(&entry.resolution_note)
            .execute(&mut *tx)
            .await
            .context("Failed to save ledger entry")?;

            let updated = sqlx::query(
                "UPDATE wallets SET cached_balance = cached_balance + ? WHERE vendor_id = ?",
            )
            .bind(entry.balance_effect())
            .bind(&entry.vendor_id)
            .execute(&mut *tx)
            .await
            .context("Failed to update cached balance")?;

            if updated.rows_affected() == 0 {
                anyhow::bail!("No wallet for vendor {}", entry.vendor_id);
            }
        }

        tx.commit().await.context("Failed to commit ledger entries")?;
        Ok(())
    }

    /// Move a withdrawal request from `from` to `to`. Compare-and-set on the
    /// status: returns false when the entry was no longer in `from`. A move to
    /// `rejected` credits the reserved amount back to the cached balance in
    /// the same transaction.
    pub async fn transition_status(
        &self,
        id: EntryId,
        from: EntryStatus,
        to: EntryStatus,
        resolved_at: DateTime<Utc>,
        resolution_note: Option<&str>,
    ) -> Result<bool> {
        let id_str = id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let updated = sqlx::query(
            r#"
            UPDATE ledger_entries
            SET status = ?, resolved_at = ?, resolution_note = ?
            WHERE id = ? AND status = ? AND entry_type = 'withdrawal_request'
            "#,
        )
        .bind(to.as_str())
        .bind(resolved_at.to_rfc3339())
        .bind(resolution_note)
        .bind(&id_str)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to update entry status")?;

        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        if from.counts_toward_balance() != to.counts_toward_balance() {
            let sign: i64 = if to.counts_toward_balance() { 1 } else { -1 };
            sqlx::query(
                r#"
                UPDATE wallets
                SET cached_balance = cached_balance + ? * (SELECT amount FROM ledger_entries WHERE id = ?)
                WHERE vendor_id = (SELECT vendor_id FROM ledger_entries WHERE id = ?)
                "#,
            )
            .bind(sign)
            .bind(&id_str)
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to update cached balance")?;
        }

        tx.commit().await.context("Failed to commit status change")?;
        Ok(true)
    }

    /// Get an entry by ID.
    pub async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch ledger entry")?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    /// Find the entry previously written under an idempotency key.
    pub async fn find_by_idempotency_key(
        &self,
        vendor_id: &str,
        key: &str,
    ) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE vendor_id = ? AND idempotency_key = ?"
        ))
        .bind(vendor_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up idempotency key")?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    /// The vendor's pending withdrawal request, if any.
    pub async fn find_pending_withdrawal(&self, vendor_id: &str) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE vendor_id = ? AND entry_type = 'withdrawal_request' AND status = 'pending' ORDER BY sequence LIMIT 1"
        ))
        .bind(vendor_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up pending withdrawal")?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    /// List a vendor's entries with optional filters.
    pub async fn list_entries(
        &self,
        vendor_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>> {
        let mut query = format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE vendor_id = ?");

        if filter.entry_type.is_some() {
            query.push_str(" AND entry_type = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.related_task_id.is_some() {
            query.push_str(" AND related_task_id = ?");
        }

        query.push_str(match filter.order {
            SortOrder::Ascending => " ORDER BY sequence ASC",
            SortOrder::Descending => " ORDER BY sequence DESC",
        });

        if let Some(lim) = filter.limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query).bind(vendor_id);
        if let Some(entry_type) = filter.entry_type {
            sql_query = sql_query.bind(entry_type.as_str());
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(task_id) = &filter.related_task_id {
            sql_query = sql_query.bind(task_id);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list ledger entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let wallet_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM wallets")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let sequence_check = sqlx::query(
            r#"
            SELECT
                MIN(sequence) as min_seq,
                MAX(sequence) as max_seq,
                COUNT(*) as count
            FROM ledger_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let min_seq: Option<i64> = sequence_check.get("min_seq");
        let max_seq: Option<i64> = sequence_check.get("max_seq");
        let entry_count: i64 = sequence_check.get("count");

        let has_sequence_gaps = match (min_seq, max_seq) {
            (Some(min), Some(max)) => (max - min + 1) != entry_count,
            _ => false,
        };

        let orphan_entries: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM ledger_entries e
            WHERE NOT EXISTS (SELECT 1 FROM wallets w WHERE w.vendor_id = e.vendor_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let zero_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM ledger_entries WHERE amount = 0")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        let sign_violations: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM ledger_entries
            WHERE (entry_type IN ('deposit', 'earning') AND amount < 0)
               OR (entry_type IN ('penalty', 'task_acceptance_fee', 'cash_collection', 'withdrawal', 'withdrawal_request') AND amount > 0)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let status_violations: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM ledger_entries
            WHERE (entry_type <> 'withdrawal_request' AND status <> 'completed')
               OR (entry_type = 'withdrawal_request' AND status = 'completed')
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let vendors_with_multiple_pending: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count FROM (
                SELECT vendor_id
                FROM ledger_entries
                WHERE entry_type = 'withdrawal_request' AND status = 'pending'
                GROUP BY vendor_id
                HAVING COUNT(*) > 1
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(IntegrityStats {
            wallet_count,
            entry_count,
            has_sequence_gaps,
            orphan_entries,
            zero_amounts,
            sign_violations,
            status_violations,
            vendors_with_multiple_pending,
        })
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerEntry> {
        let id_str: String = row.get("id");
        let entry_type_str: String = row.get("entry_type");
        let status_str: String = row.get("status");
        let metadata_json: String = row.get("metadata");
        let created_at_str: String = row.get("created_at");
        let resolved_at_str: Option<String> = row.get("resolved_at");

        let metadata: EntryMetadata =
            serde_json::from_str(&metadata_json).context("Invalid entry metadata")?;

        Ok(LedgerEntry {
            id: Uuid::parse_str(&id_str).context("Invalid entry ID")?,
            sequence: row.get("sequence"),
            vendor_id: row.get("vendor_id"),
            entry_type: EntryType::from_str(&entry_type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid entry type: {}", entry_type_str))?,
            amount: row.get("amount"),
            related_task_id: row.get("related_task_id"),
            status: EntryStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid entry status: {}", status_str))?,
            metadata,
            idempotency_key: row.get("idempotency_key"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
            resolved_at: resolved_at_str
                .as_deref()
                .map(parse_timestamp)
                .transpose()
                .context("Invalid resolved_at timestamp")?,
            resolution_note: row.get("resolution_note"),
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
