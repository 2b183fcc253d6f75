//! Ordered post-fetch filter pipeline.

use super::{FilterConfig, StageReport};
use crate::provider::PersonRecord;

/// Applies the configured criteria to a record set in a fixed stage order.
///
/// Stages are independent predicates, so the final set does not depend on
/// their order; the order only determines which stage a removal is attributed
/// to in the per-stage reports. Unknown field values always pass (fail-open).
pub struct FilterPipeline {
    config: FilterConfig,
}

struct Stage {
    name: &'static str,
    enabled: bool,
    keep: fn(&FilterConfig, &PersonRecord) -> bool,
}

impl FilterPipeline {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    fn stages(&self) -> Vec<Stage> {
        vec![
            Stage {
                name: "exclude_deceased",
                enabled: self.config.exclude_deceased,
                keep: |_, record| record.deceased != Some(true),
            },
            Stage {
                name: "age_range",
                enabled: self.config.min_age.is_some() || self.config.max_age.is_some(),
                keep: |config, record| match record.age {
                    None => true,
                    Some(age) => {
                        config.min_age.map_or(true, |min| age >= min)
                            && config.max_age.map_or(true, |max| age <= max)
                    }
                },
            },
            Stage {
                name: "min_report_year",
                enabled: self.config.min_report_year.is_some(),
                keep: |config, record| match (record.report_year, config.min_report_year) {
                    (Some(year), Some(min)) => year >= min,
                    _ => true,
                },
            },
            Stage {
                name: "exclude_married",
                enabled: self.config.exclude_married,
                keep: |_, record| match &record.marital_status {
                    Some(status) => !status.eq_ignore_ascii_case("married"),
                    None => true,
                },
            },
            Stage {
                name: "excluded_carriers",
                enabled: !self.config.excluded_carriers.is_empty(),
                keep: |config, record| {
                    let carrier = match record.phone.as_ref().and_then(|p| p.carrier.as_deref()) {
                        Some(c) => c.to_lowercase(),
                        None => return true,
                    };
                    !config
                        .excluded_carriers
                        .iter()
                        .any(|excluded| carrier.contains(&excluded.to_lowercase()))
                },
            },
            Stage {
                name: "exclude_landline",
                enabled: self.config.exclude_landline,
                keep: |_, record| {
                    match record.phone.as_ref().and_then(|p| p.phone_type.as_deref()) {
                        Some(t) => !t.eq_ignore_ascii_case("landline"),
                        None => true,
                    }
                },
            },
        ]
    }

    /// Run every enabled stage over the record set in order, returning the
    /// survivors and one report per enabled stage.
    pub fn apply(&self, records: Vec<PersonRecord>) -> (Vec<PersonRecord>, Vec<StageReport>) {
        let mut current = records;
        let mut reports = Vec::new();

        for stage in self.stages() {
            if !stage.enabled {
                continue;
            }

            let before = current.len();
            current.retain(|record| (stage.keep)(&self.config, record));
            reports.push(StageReport {
                stage: stage.name.to_string(),
                before,
                after: current.len(),
            });
        }

        (current, reports)
    }
}
