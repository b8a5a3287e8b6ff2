use serde::{Deserialize, Serialize};

use super::{EntryStatus, EntryType, LedgerEntry, Paise, WithdrawalPolicy};

/// Everything the wallet screen shows, derived from the ledger alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub current_balance: Paise,
    pub available_balance: Paise,
    pub withdrawable_amount: Paise,
    pub security_deposit: Paise,
    pub has_initial_deposit: bool,
    pub total_deposits: Paise,
    /// Approved withdrawal requests plus recorded payouts, as a magnitude
    pub total_withdrawals: Paise,
    pub pending_withdrawal: Paise,
    pub total_earnings: Paise,
    pub total_penalties: Paise,
    pub total_fees: Paise,
    pub total_cash_collections: Paise,
    pub total_adjustments: Paise,
    pub entry_count: usize,
}

/// Sum of every entry that counts toward the balance. Accumulates in i128
/// and saturates at the `Paise` bounds.
pub fn compute_balance(entries: &[LedgerEntry]) -> Paise {
    saturate(entries.iter().map(|e| i128::from(e.balance_effect())).sum())
}

fn saturate(value: i128) -> Paise {
    Paise::try_from(value).unwrap_or(if value < 0 { Paise::MIN } else { Paise::MAX })
}

#[derive(Default)]
struct Totals {
    balance: i128,
    deposits: i128,
    withdrawals: i128,
    pending: i128,
    earnings: i128,
    penalties: i128,
    fees: i128,
    cash_collections: i128,
    adjustments: i128,
}

/// Derive the wallet summary from a vendor's entries. Pure and order
/// independent, so calling it twice on the same ledger state gives identical
/// results.
pub fn summarize(
    entries: &[LedgerEntry],
    security_deposit: Paise,
    policy: WithdrawalPolicy,
) -> WalletSummary {
    let mut totals = Totals::default();
    let mut has_initial_deposit = false;

    for entry in entries {
        totals.balance += i128::from(entry.balance_effect());
        if !entry.status.counts_toward_balance() {
            continue;
        }

        let amount = i128::from(entry.amount);
        match entry.entry_type {
            EntryType::Deposit => {
                totals.deposits += amount;
                has_initial_deposit = true;
            }
            EntryType::Earning => totals.earnings += amount,
            EntryType::Penalty => totals.penalties -= amount,
            EntryType::TaskAcceptanceFee => totals.fees -= amount,
            EntryType::CashCollection => totals.cash_collections -= amount,
            EntryType::Withdrawal => totals.withdrawals -= amount,
            EntryType::WithdrawalRequest => match entry.status {
                EntryStatus::Pending => totals.pending -= amount,
                _ => totals.withdrawals -= amount,
            },
            EntryType::ManualAdjustment => totals.adjustments += amount,
        }
    }

    let current_balance = saturate(totals.balance);
    let (available_balance, withdrawable_amount) =
        policy.limits(current_balance, security_deposit);
    WalletSummary {
        current_balance,
        available_balance,
        withdrawable_amount,
        security_deposit,
        has_initial_deposit,
        total_deposits: saturate(totals.deposits),
        total_withdrawals: saturate(totals.withdrawals),
        pending_withdrawal: saturate(totals.pending),
        total_earnings: saturate(totals.earnings),
        total_penalties: saturate(totals.penalties),
        total_fees: saturate(totals.fees),
        total_cash_collections: saturate(totals.cash_collections),
        total_adjustments: saturate(totals.adjustments),
        entry_count: entries.len(),
    }
}

/// Outcome of comparing a cached balance with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    pub cached: Paise,
    pub reconciled: Paise,
}

impl BalanceCheck {
    pub fn is_consistent(&self) -> bool {
        self.cached == self.reconciled
    }

    pub fn drift(&self) -> Paise {
        self.cached.saturating_sub(self.reconciled)
    }
}
