//! Core credit ledger data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credit amounts are integer credit cents (1/100 of a credit).
///
/// Integer math keeps settlement exact; display formatting is the caller's
/// concern.
pub type CreditCents = i64;

/// How a task's cost is admitted and settled against the owner's account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingPolicy {
    /// Check a minimum balance up front, deduct the exact metered cost after
    /// execution. A deduction shortfall is reported but never discards
    /// already-collected results.
    #[default]
    PostpaidDeduct,

    /// Freeze the worst-case cost up front, settle to the actual metered
    /// cost afterward. Bounds the user's exposure to the frozen amount even
    /// if the task crashes mid-flight.
    PrepaidFreezeSettle,
}

impl BillingPolicy {
    /// Returns the policy as a string (for logging and storage).
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPolicy::PostpaidDeduct => "postpaid_deduct",
            BillingPolicy::PrepaidFreezeSettle => "prepaid_freeze_settle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "postpaid_deduct" => Some(BillingPolicy::PostpaidDeduct),
            "prepaid_freeze_settle" => Some(BillingPolicy::PrepaidFreezeSettle),
            _ => None,
        }
    }
}

/// A credit account balance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerAccount {
    /// Account identifier (the task owner id).
    pub account_id: String,
    /// Credits available for new work.
    pub available: CreditCents,
    /// Credits frozen against in-flight prepaid tasks.
    pub frozen: CreditCents,
}

impl LedgerAccount {
    /// An empty account with zero balances.
    pub fn empty(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            available: 0,
            frozen: 0,
        }
    }
}

/// Type of a ledger entry.
///
/// Entry amounts are deltas to the *available* balance, so the sum of all
/// entry amounts for an account reconstructs its available balance. Frozen
/// spend is implicit: a task's cost under prepaid billing is its freeze
/// amount minus its settle refund.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Credits purchased or granted.
    Deposit,
    /// Postpaid cost deducted after execution.
    Deduct,
    /// Worst-case cost moved from available to frozen at admission.
    Freeze,
    /// Unspent frozen credits returned to available at settlement.
    SettleRefund,
    /// Manual admin correction.
    Adjustment,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "deposit",
            EntryType::Deduct => "deduct",
            EntryType::Freeze => "freeze",
            EntryType::SettleRefund => "settle_refund",
            EntryType::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(EntryType::Deposit),
            "deduct" => Some(EntryType::Deduct),
            "freeze" => Some(EntryType::Freeze),
            "settle_refund" => Some(EntryType::SettleRefund),
            "adjustment" => Some(EntryType::Adjustment),
            _ => None,
        }
    }
}

/// One append-only ledger entry. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    /// Entry id (storage-assigned, monotonically increasing).
    pub id: i64,
    /// Account the entry belongs to.
    pub account_id: String,
    /// Signed delta to the available balance.
    pub amount: CreditCents,
    /// Available balance immediately after this mutation.
    pub balance_after: CreditCents,
    /// What kind of mutation this was.
    pub entry_type: EntryType,
    /// Human-readable description.
    pub description: String,
    /// Task this entry relates to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_task_id: Option<String>,
    /// When the mutation happened.
    pub created_at: DateTime<Utc>,
}

/// Outcome of a prepaid settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Credits written off as realized spend.
    pub spent: CreditCents,
    /// Credits returned to the available balance.
    pub refunded: CreditCents,
    /// Account snapshot after settlement.
    pub account: LedgerAccount,
}

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Admission-time shortfall: the account cannot afford the task.
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits {
        required: CreditCents,
        available: CreditCents,
    },

    /// Settlement-time shortfall on a postpaid deduction.
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: CreditCents,
        available: CreditCents,
    },

    /// A negative or otherwise invalid amount was passed.
    #[error("invalid amount: {0}")]
    InvalidAmount(CreditCents),

    /// Settlement actual cost exceeds the frozen amount.
    #[error("settlement {actual} exceeds frozen amount {frozen}")]
    SettleExceedsFrozen {
        frozen: CreditCents,
        actual: CreditCents,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}
