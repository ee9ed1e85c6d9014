use crate::config::types::{Config, OutputConfig, ScraperConfig, TargetSpec};
use crate::record::{SelectorMap, RESERVED_FIELDS};
use crate::url::is_valid_url;
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_output_config(&config.output)?;
    for (name, target) in &config.targets {
        validate_target(name, target)?;
    }
    Ok(())
}

/// Validates fetch behavior configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.concurrency_limit < 1 || config.concurrency_limit > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency-limit must be between 1 and 100, got {}",
            config.concurrency_limit
        )));
    }

    if config.backoff.min_ms > config.backoff.max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff min-ms ({}) cannot exceed max-ms ({})",
            config.backoff.min_ms, config.backoff.max_ms
        )));
    }

    if let Some(agent) = &config.user_agent {
        if agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "user-agent cannot be empty".to_string(),
            ));
        }
    }

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("Invalid header name: '{}'", name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    validate_output_filename(&config.filename)
}

/// Validates an output file name, from the config or the command line
///
/// The name must be non-empty and must not contain path separators; the
/// output directory is configured separately.
pub fn validate_output_filename(filename: &str) -> Result<(), ConfigError> {
    if filename.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output filename cannot be empty".to_string(),
        ));
    }

    if filename.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "output filename '{}' must not contain path separators; use directory instead",
            filename
        )));
    }

    Ok(())
}

/// Validates a single scrape target
fn validate_target(name: &str, target: &TargetSpec) -> Result<(), ConfigError> {
    if !is_valid_url(&target.base_url) {
        return Err(ConfigError::InvalidUrl(format!(
            "Target '{}' has invalid base-url '{}'",
            name, target.base_url
        )));
    }

    validate_selectors(&target.selectors)
        .map_err(|e| ConfigError::Validation(format!("Target '{}': {}", name, e)))?;

    let pagination = &target.pagination;
    if pagination.enabled {
        match pagination.next_button.as_deref() {
            Some(selector) if !selector.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "Target '{}' enables pagination but has no next-button selector",
                    name
                )));
            }
        }

        if pagination.max_pages < 1 {
            return Err(ConfigError::Validation(format!(
                "Target '{}' max-pages must be >= 1",
                name
            )));
        }
    }

    Ok(())
}

/// Validates a selector map
///
/// A selector map must be non-empty, and its field names must be non-empty
/// and distinct from the bookkeeping keys every record carries.
pub fn validate_selectors(selectors: &SelectorMap) -> Result<(), ConfigError> {
    if selectors.is_empty() {
        return Err(ConfigError::Validation(
            "at least one selector is required".to_string(),
        ));
    }

    for (field, selector) in selectors {
        if field.trim().is_empty() {
            return Err(ConfigError::Validation(
                "selector field names cannot be empty".to_string(),
            ));
        }

        if RESERVED_FIELDS.contains(&field.as_str()) {
            return Err(ConfigError::Validation(format!(
                "'{}' is a reserved field name",
                field
            )));
        }

        if selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "selector for field '{}' cannot be empty",
                field
            )));
        }
    }

    Ok(())
}
