pub mod cache;
pub mod collector;
pub mod config;
pub mod filter;
pub mod ledger;
pub mod metrics;
pub mod provider;
pub mod task;
pub mod testing;

pub use cache::{CacheError, CacheStats, DetailCache, SqliteDetailCache};
pub use collector::{CollectorError, CostEstimate, SubmitError, SubmitRequest, TaskCollector};
pub use config::{
    load_config, load_config_from_str, validate_config, CollectorConfig, Config, ConfigError,
    DatabaseConfig, PricingConfig, ProviderConfig, SanitizedConfig, ServerConfig,
};
pub use filter::{FilterConfig, FilterPipeline, StageReport};
pub use ledger::{
    BillingPolicy, CreditCents, CreditLedger, EntryType, LedgerAccount, LedgerEntry, LedgerError,
    Settlement, SqliteLedger,
};
pub use provider::{
    Candidate, DetailFetch, HttpProviderClient, PersonRecord, PhoneInfo, ProviderClient,
    ProviderError, SearchPage,
};
pub use task::{
    CreateTaskRequest, SearchMode, SearchQuery, SearchTask, SqliteTaskStore, TaskCounters,
    TaskError, TaskFilter, TaskLogEntry, TaskStatus, TaskStore, TaskUpdate,
};
