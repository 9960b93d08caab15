//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, WorkerConfig};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 512MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - the worker section fails [`WorkerConfig::validate`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 512 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 512MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        self.worker.validate()
    }
}

impl WorkerConfig {
    /// Validate the worker section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the generation or prefix is empty or
    /// contains whitespace, the scope is not an http(s) directory URL, the
    /// resource pattern does not compile, or a locator cannot be resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("worker.generation", &self.generation), ("worker.cache_prefix", &self.cache_prefix)] {
            if value.is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
            if value.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not contain whitespace".into() });
            }
        }

        match self.scope.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ConfigError::Invalid {
                    field: "worker.scope".into(),
                    reason: format!("unsupported scheme: {scheme}"),
                });
            }
        }
        if !self.scope.path().ends_with('/') {
            return Err(ConfigError::Invalid { field: "worker.scope".into(), reason: "path must end with '/'".into() });
        }

        self.resource_regex()?;
        self.precache_urls()?;
        self.default_resource()?;

        if self.precache.is_empty() {
            tracing::warn!(generation = %self.generation, "precache list is empty; install will cache nothing");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn with_worker(worker: WorkerConfig) -> AppConfig {
        AppConfig { worker, ..Default::default() }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_empty_generation() {
        let config = with_worker(WorkerConfig { generation: String::new(), ..Default::default() });
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "worker.generation"));
    }

    #[test]
    fn test_validate_prefix_whitespace() {
        let config = with_worker(WorkerConfig { cache_prefix: "my cache".into(), ..Default::default() });
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "worker.cache_prefix"));
    }

    #[test]
    fn test_validate_scope_scheme() {
        let config = with_worker(WorkerConfig { scope: Url::parse("file:///srv/app/").unwrap(), ..Default::default() });
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "worker.scope"));
    }

    #[test]
    fn test_validate_scope_not_directory() {
        let config = with_worker(WorkerConfig {
            scope: Url::parse("https://example.com/app").unwrap(),
            ..Default::default()
        });
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "worker.scope"));
    }

    #[test]
    fn test_validate_bad_pattern() {
        let config = with_worker(WorkerConfig { resource_pattern: "(unclosed".into(), ..Default::default() });
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "worker.resource_pattern"));
    }

    #[test]
    fn test_validate_empty_precache_allowed() {
        let config = with_worker(WorkerConfig { precache: Vec::new(), ..Default::default() });
        assert!(config.validate().is_ok());
    }
}
