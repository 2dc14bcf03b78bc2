use crate::config::types::{
    Config, EngineConfig, ProxyConfig, RequestConfig, StoreBackend, StoreConfig,
};
use crate::ConfigError;
use url::Url;

/// Upper bound on `concurrent-requests`
const MAX_CONCURRENT_REQUESTS: usize = 10_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_request_config(&config.request)?;
    validate_store_config(&config.store)?;
    validate_proxy_config(&config.proxy)?;

    if let Some(output) = &config.output {
        if output.database_path.is_empty() {
            return Err(ConfigError::Validation("output database_path cannot be empty".to_string()));
        }
    }

    Ok(())
}

/// Validates the job name and seed URLs
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation("engine name cannot be empty".to_string()));
    }

    if config.name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "engine name must not contain whitespace, got '{}'",
            config.name
        )));
    }

    for seed in &config.seeds {
        validate_http_url(seed.trim(), "seed URL")?;
    }

    Ok(())
}

/// Validates request and scheduling settings
fn validate_request_config(config: &RequestConfig) -> Result<(), ConfigError> {
    if config.concurrent_requests < 1 || config.concurrent_requests > MAX_CONCURRENT_REQUESTS {
        return Err(ConfigError::Validation(format!(
            "concurrent_requests must be between 1 and {}, got {}",
            MAX_CONCURRENT_REQUESTS, config.concurrent_requests
        )));
    }

    if config.interval_ms < 1 {
        return Err(ConfigError::Validation("interval_ms must be >= 1ms".to_string()));
    }

    if config.dispatch_interval_ms < 1 {
        return Err(ConfigError::Validation("dispatch_interval_ms must be >= 1ms".to_string()));
    }

    if config.timeout_ms < 1 {
        return Err(ConfigError::Validation("timeout_ms must be >= 1ms".to_string()));
    }

    Ok(())
}

/// Validates that the chosen backend has what it needs
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    match config.backend {
        StoreBackend::Memory => Ok(()),
        StoreBackend::Sqlite => match config.path.as_deref() {
            Some(path) if !path.is_empty() => Ok(()),
            _ => Err(ConfigError::Validation("sqlite store requires a non-empty path".to_string())),
        },
        StoreBackend::Redis => match config.url.as_deref() {
            Some(url) => Url::parse(url)
                .map(|_| ())
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redis url: {}", e))),
            None => Err(ConfigError::Validation("redis store requires a url".to_string())),
        },
    }
}

fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for proxy in &config.urls {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy URL '{}': {}", proxy, e)))?;
    }
    Ok(())
}

/// Checks that `raw` parses as an http(s) URL
fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            what, raw
        )));
    }

    Ok(())
}
