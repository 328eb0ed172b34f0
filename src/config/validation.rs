use crate::config::types::{Config, LimitsConfig, RateLimitConfig, TopicConfig, UserAgentConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_limits(&config.limits)?;
    validate_rate_limit(&config.rate_limit)?;
    validate_topic(&config.topic)?;
    validate_user_agent(&config.user_agent)?;
    validate_patterns(&config.include_patterns)?;
    validate_patterns(&config.exclude_patterns)?;
    Ok(())
}

fn validate_limits(limits: &LimitsConfig) -> Result<(), ConfigError> {
    if limits.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            limits.max_pages
        )));
    }
    Ok(())
}

fn validate_rate_limit(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if !config.per_host_rps.is_finite() || config.per_host_rps <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "per_host_rps must be a positive number, got {}",
            config.per_host_rps
        )));
    }

    if config.max_parallel < 1 || config.max_parallel > 100 {
        return Err(ConfigError::Validation(format!(
            "max_parallel must be between 1 and 100, got {}",
            config.max_parallel
        )));
    }

    Ok(())
}

fn validate_topic(topic: &TopicConfig) -> Result<(), ConfigError> {
    if topic.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "topic name cannot be empty".to_string(),
        ));
    }

    validate_http_url(&topic.wiki_base, "wiki_base")
}

fn validate_user_agent(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Ok(())
}

fn validate_patterns(patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }
    Ok(())
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}
