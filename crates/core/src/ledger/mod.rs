//! Credit accounting: balances, billing policies and the append-only entry log.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteLedger;
pub use store::CreditLedger;
pub use types::{
    BillingPolicy, CreditCents, EntryType, LedgerAccount, LedgerEntry, LedgerError, Settlement,
};
