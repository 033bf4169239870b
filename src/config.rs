//! Worker configuration.
//!
//! Values come from defaults, then environment variables, then CLI flags.

use std::time::Duration;

use crate::error::ConfigError;
use crate::queue::DEFAULT_QUEUE;

/// Configuration for a worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// Queue names to listen on, highest priority first.
    pub queues: Vec<String>,
    /// Stop once every queue is empty instead of waiting for more work.
    pub burst: bool,
    /// Longest single wait on the store before re-checking for shutdown.
    pub poll_timeout: Duration,
    /// Worker name; generated when not set.
    pub name: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queues: vec![DEFAULT_QUEUE.to_string()],
            burst: false,
            poll_timeout: Duration::from_secs(5),
            name: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RQ_REDIS_URL`: Redis URL (default: redis://localhost:6379)
    /// - `RQ_QUEUES`: Comma-separated queue names, highest priority first (default: default)
    /// - `RQ_BURST`: Stop when queues are drained (default: false)
    /// - `RQ_POLL_TIMEOUT_SECS`: Longest single blocking wait (default: 5)
    /// - `RQ_WORKER_NAME`: Worker name (default: generated)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("RQ_REDIS_URL") {
            config.redis_url = val;
        }

        if let Some(val) = lookup("RQ_QUEUES") {
            config.queues = parse_queue_list(&val);
        }

        if let Some(val) = lookup("RQ_BURST") {
            config.burst = parse_env_bool(&val, "RQ_BURST")?;
        }

        if let Some(val) = lookup("RQ_POLL_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "RQ_POLL_TIMEOUT_SECS")?;
            config.poll_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("RQ_WORKER_NAME") {
            config.name = Some(val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redis_url cannot be empty".to_string(),
            ));
        }

        if self.queues.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one queue is required".to_string(),
            ));
        }

        if self.queues.iter().any(|q| q.is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "queue names cannot be empty".to_string(),
            ));
        }

        if self.poll_timeout.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "poll_timeout must be at least one second".to_string(),
            ));
        }

        Ok(())
    }

    /// Sets the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Sets the queues to listen on, highest priority first.
    pub fn with_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queues = queues.into_iter().map(Into::into).collect();
        self
    }

    /// Sets burst mode.
    pub fn with_burst(mut self, burst: bool) -> Self {
        self.burst = burst;
        self
    }

    /// Sets the poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the worker name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

fn parse_queue_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.queues, vec!["default".to_string()]);
        assert!(!config.burst);
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        assert!(config.name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerConfig::new()
            .with_redis_url("redis://custom:6380")
            .with_queues(["high", "low"])
            .with_burst(true)
            .with_poll_timeout(Duration::from_secs(2))
            .with_name("w1");

        assert_eq!(config.redis_url, "redis://custom:6380");
        assert_eq!(config.queues, vec!["high".to_string(), "low".to_string()]);
        assert!(config.burst);
        assert_eq!(config.poll_timeout, Duration::from_secs(2));
        assert_eq!(config.name.as_deref(), Some("w1"));
    }

    #[test]
    fn test_from_lookup() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("RQ_REDIS_URL", "redis://queue-host:6379/2"),
            ("RQ_QUEUES", "high, default ,,low"),
            ("RQ_BURST", "yes"),
            ("RQ_POLL_TIMEOUT_SECS", "10"),
        ]))
        .expect("valid config");

        assert_eq!(config.redis_url, "redis://queue-host:6379/2");
        assert_eq!(config.queues, vec!["high", "default", "low"]);
        assert!(config.burst);
        assert_eq!(config.poll_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_from_lookup_invalid_values() {
        let err = WorkerConfig::from_lookup(lookup(&[("RQ_BURST", "maybe")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("RQ_BURST"));

        let err = WorkerConfig::from_lookup(lookup(&[("RQ_POLL_TIMEOUT_SECS", "soon")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("RQ_POLL_TIMEOUT_SECS"));
    }

    #[test]
    fn test_validation() {
        let config = WorkerConfig::new().with_queues(Vec::<String>::new());
        assert!(config.validate().is_err());

        let config = WorkerConfig::new().with_poll_timeout(Duration::from_millis(100));
        assert!(config.validate().is_err());

        let config = WorkerConfig::new().with_redis_url("");
        assert!(config.validate().is_err());

        let err = WorkerConfig::from_lookup(lookup(&[("RQ_QUEUES", " , ")]))
            .expect_err("should fail");
        assert!(err.to_string().contains("at least one queue"));
    }
}
