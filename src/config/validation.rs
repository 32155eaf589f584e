use std::collections::HashSet;

use crate::config::types::{Config, CrawlerConfig, ExtractConfig, OutputConfig, UserAgentConfig};
use crate::extract::{Cardinality, ExtractError, Extractor, ValueType};
use crate::ConfigError;
use url::Url;

/// Upper bound for every configured timeout and delay: one year
const MAX_SECONDS: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Validates the entire configuration
///
/// Runs before any network activity; every error here aborts the crawl.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seeds(&config.seeds)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_extract_config(&config.extract)?;
    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.worker_count < 1 || config.worker_count > 100 {
        return Err(ConfigError::Validation(format!(
            "worker_count must be between 1 and 100, got {}",
            config.worker_count
        )));
    }

    if config.max_tasks < 1 {
        return Err(ConfigError::Validation(format!(
            "max_tasks must be >= 1, got {}",
            config.max_tasks
        )));
    }

    validate_seconds("fetch_timeout_seconds", config.fetch_timeout_seconds, false)?;

    if let Some(timeout) = config.crawl_timeout_seconds {
        validate_seconds("crawl_timeout_seconds", timeout, false)?;
    }

    validate_seconds("min_delay_seconds", config.min_delay_seconds, true)?;
    validate_seconds("max_delay_seconds", config.max_delay_seconds, false)?;

    if config.min_delay_seconds > config.max_delay_seconds {
        return Err(ConfigError::Validation(format!(
            "min_delay_seconds ({}) cannot exceed max_delay_seconds ({})",
            config.min_delay_seconds, config.max_delay_seconds
        )));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    Ok(())
}

/// Validates a duration given in seconds
///
/// Values must be finite, at most `MAX_SECONDS`, and positive (or zero when
/// `allow_zero` is set).
fn validate_seconds(name: &str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let lower_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if !(value.is_finite() && lower_ok) {
        let bound = if allow_zero { ">= 0" } else { "positive" };
        return Err(ConfigError::Validation(format!(
            "{} must be {}, got {}",
            name, bound, value
        )));
    }

    if value > MAX_SECONDS {
        return Err(ConfigError::Validation(format!(
            "{} must be at most {} (one year), got {}",
            name, MAX_SECONDS, value
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
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

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.export_path.is_empty() {
        return Err(ConfigError::Validation(
            "export_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates extraction fields and compiles every selector once
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for field in &config.fields {
        if field.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "extract field name cannot be empty".to_string(),
            ));
        }

        // "url" is the provenance column of the export
        if field.name == "url" {
            return Err(ConfigError::Validation(
                "extract field name 'url' is reserved".to_string(),
            ));
        }

        if !seen.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate extract field name '{}'",
                field.name
            )));
        }

        if field.cardinality == Cardinality::List && field.value_type != ValueType::String {
            return Err(ConfigError::Validation(format!(
                "list field '{}' must have type \"string\"",
                field.name
            )));
        }
    }

    Extractor::from_config(config).map_err(|e| match e {
        ExtractError::InvalidSelector { field, message } => {
            ConfigError::InvalidSelector { field, message }
        }
        other => ConfigError::Validation(other.to_string()),
    })?;

    Ok(())
}

/// Validates a domain pattern (supports a leading `*.` wildcard)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "Pattern '{}' has no domain after the wildcard",
            pattern
        )));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' has a misplaced '.' or '-'",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid contact_email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid contact_email format: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, FieldConfig};

    fn valid_config() -> Config {
        Config {
            seeds: vec!["https://example.com/".to_string()],
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestHarvester".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            cache: CacheConfig::default(),
            output: OutputConfig::default(),
            extract: ExtractConfig::default(),
        }
    }

    fn field(name: &str, selector: &str) -> FieldConfig {
        FieldConfig {
            name: name.to_string(),
            selector: selector.to_string(),
            attr: None,
            cardinality: Cardinality::Required,
            value_type: ValueType::String,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_seeds_required() {
        let mut config = valid_config();
        config.seeds.clear();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_seed_scheme() {
        let mut config = valid_config();
        config.seeds = vec!["ftp://example.com/".to_string()];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_non_positive_timeout_rejected() {
        let mut config = valid_config();
        config.crawler.fetch_timeout_seconds = 0.0;
        assert!(validate(&config).is_err());

        config.crawler.fetch_timeout_seconds = -1.0;
        assert!(validate(&config).is_err());

        config.crawler.fetch_timeout_seconds = 5.0;
        config.crawler.crawl_timeout_seconds = Some(0.0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_delay_bounds() {
        let mut config = valid_config();
        config.crawler.min_delay_seconds = 10.0;
        config.crawler.max_delay_seconds = 5.0;
        assert!(validate(&config).is_err());

        config.crawler.min_delay_seconds = 0.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_durations_capped_at_one_year() {
        let mut config = valid_config();
        config.crawler.crawl_timeout_seconds = Some(1e19);
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.crawler.crawl_timeout_seconds = Some(MAX_SECONDS);
        assert!(validate(&config).is_ok());

        config.crawler.min_delay_seconds = 1.0e19;
        config.crawler.max_delay_seconds = 1.5e19;
        assert!(validate(&config).is_err());

        config.crawler.min_delay_seconds = 1.0;
        config.crawler.max_delay_seconds = MAX_SECONDS + 1.0;
        assert!(validate(&config).is_err());

        config.crawler.max_delay_seconds = 60.0;
        config.crawler.fetch_timeout_seconds = f64::INFINITY;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_worker_count_bounds() {
        let mut config = valid_config();
        config.crawler.worker_count = 0;
        assert!(validate(&config).is_err());
        config.crawler.worker_count = 101;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_field_names() {
        let mut config = valid_config();
        config.extract.fields = vec![field("title", "tag:h1"), field("title", "tag:h2")];
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_list_field_must_be_string() {
        let mut config = valid_config();
        let mut f = field("prices", "class:price");
        f.cardinality = Cardinality::List;
        f.value_type = ValueType::Number;
        config.extract.fields = vec![f];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_selector() {
        let mut config = valid_config();
        config.extract.fields = vec![field("title", "path:h1[[")];
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSelector { ref field, .. } if field == "title"));
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("example.com").is_ok());
        assert!(validate_domain_pattern("*.example.com").is_ok());
        assert!(validate_domain_pattern("localhost").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("example..com").is_err());
        assert!(validate_domain_pattern("exa mple.com").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }
}
