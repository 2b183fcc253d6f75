//! SQLite-backed credit ledger implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};

use super::{
    CreditCents, CreditLedger, EntryType, LedgerAccount, LedgerEntry, LedgerError, Settlement,
};

/// SQLite-backed credit ledger.
///
/// All mutations run inside one transaction under the connection mutex, so
/// check-then-write is atomic per account.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Create a new SQLite ledger, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path).map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn =
            Connection::open_in_memory().map_err(|e| LedgerError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_accounts (
                account_id TEXT PRIMARY KEY,
                available INTEGER NOT NULL DEFAULT 0,
                frozen INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                balance_after INTEGER NOT NULL,
                entry_type TEXT NOT NULL,
                description TEXT NOT NULL,
                related_task_id TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_entries_account ON ledger_entries(account_id);
            CREATE INDEX IF NOT EXISTS idx_ledger_entries_task ON ledger_entries(related_task_id);
            "#,
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    fn load_account(tx: &Transaction, account_id: &str) -> Result<LedgerAccount, LedgerError> {
        let result = tx.query_row(
            "SELECT available, frozen FROM ledger_accounts WHERE account_id = ?",
            params![account_id],
            |row| {
                Ok(LedgerAccount {
                    account_id: account_id.to_string(),
                    available: row.get(0)?,
                    frozen: row.get(1)?,
                })
            },
        );

        match result {
            Ok(account) => Ok(account),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(LedgerAccount::empty(account_id)),
            Err(e) => Err(LedgerError::Database(e.to_string())),
        }
    }

    fn store_account(tx: &Transaction, account: &LedgerAccount) -> Result<(), LedgerError> {
        tx.execute(
            "INSERT INTO ledger_accounts (account_id, available, frozen) VALUES (?, ?, ?)
             ON CONFLICT(account_id) DO UPDATE SET
                 available = excluded.available,
                 frozen = excluded.frozen",
            params![account.account_id, account.available, account.frozen],
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(())
    }

    fn append_entry(
        tx: &Transaction,
        account_id: &str,
        amount: CreditCents,
        balance_after: CreditCents,
        entry_type: EntryType,
        description: &str,
        related_task_id: Option<&str>,
    ) -> Result<(), LedgerError> {
        tx.execute(
            "INSERT INTO ledger_entries
                 (account_id, amount, balance_after, entry_type, description, related_task_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                account_id,
                amount,
                balance_after,
                entry_type.as_str(),
                description,
                related_task_id,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LedgerEntry> {
        let entry_type_str: String = row.get(4)?;
        let created_at_str: String = row.get(6)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(LedgerEntry {
            id: row.get(0)?,
            account_id: row.get(1)?,
            amount: row.get(2)?,
            balance_after: row.get(3)?,
            entry_type: EntryType::parse(&entry_type_str).unwrap_or(EntryType::Adjustment),
            description: row.get(5)?,
            created_at,
            related_task_id: row.get(7)?,
        })
    }

    const ENTRY_COLUMNS: &'static str =
        "id, account_id, amount, balance_after, entry_type, description, created_at, related_task_id";
}

impl CreditLedger for SqliteLedger {
    fn account(&self, account_id: &str) -> Result<LedgerAccount, LedgerError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        let account = Self::load_account(&tx, account_id)?;
        tx.commit().map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(account)
    }

    fn deposit(
        &self,
        account_id: &str,
        amount: CreditCents,
        description: &str,
    ) -> Result<LedgerAccount, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut account = Self::load_account(&tx, account_id)?;
        account.available += amount;
        Self::store_account(&tx, &account)?;
        Self::append_entry(
            &tx,
            account_id,
            amount,
            account.available,
            EntryType::Deposit,
            description,
            None,
        )?;

        tx.commit().map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(account)
    }

    fn deduct(
        &self,
        account_id: &str,
        amount: CreditCents,
        description: &str,
        related_task_id: &str,
    ) -> Result<LedgerAccount, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut account = Self::load_account(&tx, account_id)?;
        if account.available < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: account.available,
            });
        }

        account.available -= amount;
        Self::store_account(&tx, &account)?;
        Self::append_entry(
            &tx,
            account_id,
            -amount,
            account.available,
            EntryType::Deduct,
            description,
            Some(related_task_id),
        )?;

        tx.commit().map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(account)
    }

    fn freeze(
        &self,
        account_id: &str,
        amount: CreditCents,
        related_task_id: &str,
    ) -> Result<LedgerAccount, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut account = Self::load_account(&tx, account_id)?;
        if account.available < amount {
            return Err(LedgerError::InsufficientCredits {
                required: amount,
                available: account.available,
            });
        }

        account.available -= amount;
        account.frozen += amount;
        Self::store_account(&tx, &account)?;
        Self::append_entry(
            &tx,
            account_id,
            -amount,
            account.available,
            EntryType::Freeze,
            &format!("freeze for task {}", related_task_id),
            Some(related_task_id),
        )?;

        tx.commit().map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(account)
    }

    fn settle(
        &self,
        account_id: &str,
        frozen_amount: CreditCents,
        actual_cost: CreditCents,
        related_task_id: &str,
    ) -> Result<Settlement, LedgerError> {
        if frozen_amount < 0 || actual_cost < 0 {
            return Err(LedgerError::InvalidAmount(actual_cost.min(frozen_amount)));
        }
        if actual_cost > frozen_amount {
            return Err(LedgerError::SettleExceedsFrozen {
                frozen: frozen_amount,
                actual: actual_cost,
            });
        }

        let refund = frozen_amount - actual_cost;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut account = Self::load_account(&tx, account_id)?;
        // Frozen never goes negative even if the caller's bookkeeping drifts.
        account.frozen = (account.frozen - frozen_amount).max(0);
        account.available += refund;
        Self::store_account(&tx, &account)?;
        Self::append_entry(
            &tx,
            account_id,
            refund,
            account.available,
            EntryType::SettleRefund,
            &format!(
                "settle task {}: spent {}, refunded {}",
                related_task_id, actual_cost, refund
            ),
            Some(related_task_id),
        )?;

        tx.commit().map_err(|e| LedgerError::Database(e.to_string()))?;
        Ok(Settlement {
            spent: actual_cost,
            refunded: refund,
            account,
        })
    }

    fn entries_for_account(
        &self,
        account_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE account_id = ? ORDER BY id DESC LIMIT ? OFFSET ?",
            Self::ENTRY_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![account_id, limit, offset], Self::row_to_entry)
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| LedgerError::Database(e.to_string()))?);
        }
        Ok(entries)
    }

    fn entries_for_task(&self, task_id: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE related_task_id = ? ORDER BY id ASC",
            Self::ENTRY_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![task_id], Self::row_to_entry)
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| LedgerError::Database(e.to_string()))?);
        }
        Ok(entries)
    }
}
