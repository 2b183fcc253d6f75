use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Pricing is non-negative
/// - Collector bounds are all at least 1
/// - The default age window is ordered
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.pricing.search_page_cost < 0 || config.pricing.detail_cost < 0 {
        return Err(ConfigError::ValidationError(
            "pricing costs cannot be negative".to_string(),
        ));
    }

    if config.collector.wave_size == 0 {
        return Err(ConfigError::ValidationError(
            "collector.wave_size must be at least 1".to_string(),
        ));
    }

    if config.collector.max_pages_per_subtask == 0 {
        return Err(ConfigError::ValidationError(
            "collector.max_pages_per_subtask must be at least 1".to_string(),
        ));
    }

    if config.collector.max_candidates_per_subtask == 0 {
        return Err(ConfigError::ValidationError(
            "collector.max_candidates_per_subtask must be at least 1".to_string(),
        ));
    }

    if config.collector.cache_ttl_days < 1 {
        return Err(ConfigError::ValidationError(
            "collector.cache_ttl_days must be at least 1".to_string(),
        ));
    }

    if let (Some(min), Some(max)) = (
        config.collector.default_min_age,
        config.collector.default_max_age,
    ) {
        if min > max {
            return Err(ConfigError::ValidationError(
                "collector.default_min_age cannot exceed default_max_age".to_string(),
            ));
        }
    }

    Ok(())
}
