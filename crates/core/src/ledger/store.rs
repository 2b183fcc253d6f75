//! Credit ledger trait.

use super::{CreditCents, LedgerAccount, LedgerEntry, LedgerError, Settlement};

/// Trait for credit ledger backends.
///
/// Every mutation is a single atomic check-and-update per account and writes
/// exactly one `LedgerEntry` per available-balance change, so concurrent
/// callers (tasks, admin adjustments) can treat each call as optimistic
/// check-then-act.
pub trait CreditLedger: Send + Sync {
    /// Get the account balance snapshot. Unknown accounts read as zero.
    fn account(&self, account_id: &str) -> Result<LedgerAccount, LedgerError>;

    /// Add credits to the available balance, creating the account if needed.
    fn deposit(
        &self,
        account_id: &str,
        amount: CreditCents,
        description: &str,
    ) -> Result<LedgerAccount, LedgerError>;

    /// Deduct an exact metered cost from the available balance.
    ///
    /// Fails with `InsufficientBalance` if the available balance is short at
    /// this instant; the caller decides what that means for its task.
    fn deduct(
        &self,
        account_id: &str,
        amount: CreditCents,
        description: &str,
        related_task_id: &str,
    ) -> Result<LedgerAccount, LedgerError>;

    /// Move `amount` from available to frozen for a prepaid task.
    ///
    /// Fails with `InsufficientCredits` if the available balance is short.
    fn freeze(
        &self,
        account_id: &str,
        amount: CreditCents,
        related_task_id: &str,
    ) -> Result<LedgerAccount, LedgerError>;

    /// Settle a prepaid task: release `frozen_amount` from the frozen
    /// balance, write off `actual_cost` as spend, and return the remainder
    /// (never negative) to available.
    fn settle(
        &self,
        account_id: &str,
        frozen_amount: CreditCents,
        actual_cost: CreditCents,
        related_task_id: &str,
    ) -> Result<Settlement, LedgerError>;

    /// List entries for an account, newest first.
    fn entries_for_account(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// List entries related to a task, oldest first.
    fn entries_for_task(&self, task_id: &str) -> Result<Vec<LedgerEntry>, LedgerError>;
}
