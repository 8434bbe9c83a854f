use crate::config::types::{
    ClassifyConfig, Config, CrawlConfig, HttpConfig, OracleConfig, OutputConfig, RetryConfig,
};
use crate::url::Scope;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_classify_config(&config.classify)?;
    validate_http_config(&config.http)?;
    validate_retry_config(&config.retry)?;
    validate_oracle_config(&config.oracle)?;
    validate_output_config(&config.output)?;
    if let Some(scope) = &config.scope {
        validate_scope(scope)?;
    }
    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_urls < 1 {
        return Err(ConfigError::Validation(
            "max_urls must be >= 1".to_string(),
        ));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_interval must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_classify_config(config: &ClassifyConfig) -> Result<(), ConfigError> {
    if config.max_nodes_per_call < 1 {
        return Err(ConfigError::Validation(
            "max_nodes_per_call must be >= 1".to_string(),
        ));
    }

    if config.max_batch_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_batch_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_oracle_config(config: &OracleConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid oracle endpoint: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Oracle endpoint must be http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.snapshot_dir.is_empty() {
        return Err(ConfigError::Validation(
            "snapshot_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_scope(scope: &Scope) -> Result<(), ConfigError> {
    if scope.hosts.is_empty() {
        return Err(ConfigError::Validation(
            "scope must list at least one host".to_string(),
        ));
    }

    for host in &scope.hosts {
        if host.is_empty() {
            return Err(ConfigError::Validation(
                "scope host cannot be empty".to_string(),
            ));
        }
        if !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "scope host '{}' contains invalid characters",
                host
            )));
        }
    }

    for prefix in &scope.path_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "path prefix '{}' must start with '/'",
                prefix
            )));
        }
    }

    Ok(())
}
