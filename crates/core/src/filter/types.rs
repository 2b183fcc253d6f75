//! Filter configuration types.

use serde::{Deserialize, Serialize};

/// Closed filter configuration for a task.
///
/// Every criterion is a named optional field with a documented default, so an
/// unknown key in a submission is a deserialization error rather than a
/// silent no-op. Stored verbatim on the task at submission time and immutable
/// for the task's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Drop records flagged as deceased. On by default.
    pub exclude_deceased: bool,
    /// Keep records with age >= this value (inclusive).
    pub min_age: Option<u8>,
    /// Keep records with age <= this value (inclusive).
    pub max_age: Option<u8>,
    /// Keep records whose report year is at least this value.
    pub min_report_year: Option<u16>,
    /// Drop records whose marital status is "married".
    pub exclude_married: bool,
    /// Drop records whose phone carrier name contains any of these,
    /// case-insensitively.
    pub excluded_carriers: Vec<String>,
    /// Drop records whose phone type is "landline".
    pub exclude_landline: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_deceased: true,
            min_age: None,
            max_age: None,
            min_report_year: None,
            exclude_married: false,
            excluded_carriers: Vec::new(),
            exclude_landline: false,
        }
    }
}

impl FilterConfig {
    /// Fill unset age window and report year from product defaults.
    ///
    /// Applied at submission time, so a config change never retroactively
    /// affects an admitted task.
    pub fn with_defaults(
        mut self,
        default_min_age: Option<u8>,
        default_max_age: Option<u8>,
        default_min_report_year: Option<u16>,
    ) -> Self {
        if self.min_age.is_none() {
            self.min_age = default_min_age;
        }
        if self.max_age.is_none() {
            self.max_age = default_max_age;
        }
        if self.min_report_year.is_none() {
            self.min_report_year = default_min_report_year;
        }
        self
    }
}

/// Before and after counts for one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageReport {
    /// Stage name, stable across runs.
    pub stage: String,
    /// Records entering the stage.
    pub before: usize,
    /// Records surviving the stage.
    pub after: usize,
}

impl StageReport {
    /// How many records this stage removed.
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}
