//! Public-record lookup provider boundary.

mod http;
mod types;

pub use http::HttpProviderClient;
pub use types::{
    Candidate, DetailFetch, PersonRecord, PhoneInfo, ProviderClient, ProviderError, SearchPage,
};
