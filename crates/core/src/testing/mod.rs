//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides a mock lookup provider and record fixtures, allowing
//! full task lifecycle tests without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use dossier_core::testing::{fixtures, MockProvider};
//!
//! let provider = MockProvider::new();
//! provider.set_candidates("Jane Doe", vec![fixtures::candidate("link-1", "Jane Doe")]).await;
//! provider.set_record("link-1", fixtures::person_record("Jane Doe", 52)).await;
//!
//! // Use in a TaskCollector...
//! ```

mod mock_provider;

pub use mock_provider::{MockProvider, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::provider::{Candidate, PersonRecord, PhoneInfo};

    /// Create a test candidate with reasonable defaults.
    pub fn candidate(detail_link: &str, search_name: &str) -> Candidate {
        Candidate {
            detail_link: detail_link.to_string(),
            subtask_index: 0,
            search_name: search_name.to_string(),
            search_location: None,
        }
    }

    /// Create a test person record with reasonable defaults.
    pub fn person_record(name: &str, age: u8) -> PersonRecord {
        PersonRecord {
            name: name.to_string(),
            age: Some(age),
            location: Some("Austin, TX".to_string()),
            phone: Some(PhoneInfo {
                number: "555-0142".to_string(),
                phone_type: Some("mobile".to_string()),
                carrier: Some("Example Wireless".to_string()),
            }),
            marital_status: Some("Single".to_string()),
            deceased: Some(false),
            relatives: vec![],
            emails: vec![],
            report_year: Some(2024),
            from_cache: false,
        }
    }

    /// Create a test record with a landline phone.
    pub fn landline_record(name: &str, age: u8) -> PersonRecord {
        let mut record = person_record(name, age);
        record.phone = Some(PhoneInfo {
            number: "555-0100".to_string(),
            phone_type: Some("landline".to_string()),
            carrier: None,
        });
        record
    }

    /// Create a test record flagged as deceased.
    pub fn deceased_record(name: &str, age: u8) -> PersonRecord {
        let mut record = person_record(name, age);
        record.deceased = Some(true);
        record
    }
}
