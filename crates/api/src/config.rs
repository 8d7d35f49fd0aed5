//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crud_client::ClientConfig;
use saga::{ExecutionPolicy, LocalSubstrate, PipelineConfig};

/// Server and pipeline configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SERVER_HOST` — bind address (default: `"0.0.0.0"`)
/// - `SERVER_PORT` — listen port (default: `8080`)
/// - `API1_BASE_URL`, `API2_BASE_URL`, `API3_BASE_URL` — the three services
/// - `MOCK_MODE` — fabricate service responses (default: `true`)
/// - `HTTP_TIMEOUT_SECONDS` — per-call timeout (default: `10`)
/// - `TRANSACTION_TIMEOUT_SECONDS` — end-to-end deadline (default: `30`)
/// - `MAX_CONCURRENT_STEPS` — step invocations running at once (default: `100`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub service_urls: [String; 3],
    pub mock_mode: bool,
    pub http_timeout_secs: u64,
    pub transaction_timeout_secs: u64,
    pub max_concurrent_steps: usize,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let [url1, url2, url3] = defaults.service_urls;

        Self {
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "SERVER_PORT").unwrap_or(defaults.port),
            service_urls: [
                lookup("API1_BASE_URL").unwrap_or(url1),
                lookup("API2_BASE_URL").unwrap_or(url2),
                lookup("API3_BASE_URL").unwrap_or(url3),
            ],
            mock_mode: lookup("MOCK_MODE")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.mock_mode),
            http_timeout_secs: parse_positive(&lookup, "HTTP_TIMEOUT_SECONDS")
                .unwrap_or(defaults.http_timeout_secs),
            transaction_timeout_secs: parse_positive(&lookup, "TRANSACTION_TIMEOUT_SECONDS")
                .unwrap_or(defaults.transaction_timeout_secs),
            max_concurrent_steps: parse_var(&lookup, "MAX_CONCURRENT_STEPS")
                .filter(|slots: &usize| *slots > 0)
                .unwrap_or(defaults.max_concurrent_steps),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    /// Service URLs and execution policy for the orchestrator.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(self.service_urls.clone()).with_policy(ExecutionPolicy::from_timeouts(
            self.http_timeout(),
            self.transaction_timeout(),
        ))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.http_timeout(),
            mock_mode: self.mock_mode,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            service_urls: [
                "http://localhost:8081/api1".to_string(),
                "http://localhost:8082/api2".to_string(),
                "http://localhost:8083/api3".to_string(),
            ],
            mock_mode: true,
            http_timeout_secs: 10,
            transaction_timeout_secs: 30,
            max_concurrent_steps: LocalSubstrate::<crud_client::CrudClient>::DEFAULT_SLOTS,
            log_level: "info".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Timeouts of zero seconds would fail every step, so they fall back to the default.
fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    parse_var(lookup, key).filter(|secs: &u64| *secs > 0)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.mock_mode);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.transaction_timeout(), Duration::from_secs(30));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_lookup_overrides_defaults() {
        let config = from_pairs(&[
            ("SERVER_PORT", "9000"),
            ("API2_BASE_URL", "http://svc2/api"),
            ("MOCK_MODE", "false"),
            ("HTTP_TIMEOUT_SECONDS", "2"),
            ("TRANSACTION_TIMEOUT_SECONDS", "12"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.service_urls[1], "http://svc2/api");
        assert!(!config.mock_mode);

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.policy.start_to_close, Duration::from_secs(2));
        assert_eq!(pipeline.policy.deadline, Duration::from_secs(12));
        assert_eq!(config.client_config().timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = from_pairs(&[("SERVER_PORT", "http"), ("MOCK_MODE", "maybe")]);
        assert_eq!(config.port, 8080);
        assert!(config.mock_mode);
    }

    #[test]
    fn test_numeric_fields_parse_with_their_own_types() {
        let config = from_pairs(&[
            ("SERVER_PORT", "9001"),
            ("HTTP_TIMEOUT_SECONDS", "7"),
            ("TRANSACTION_TIMEOUT_SECONDS", "70000000000"),
            ("MAX_CONCURRENT_STEPS", "4"),
        ]);
        assert_eq!(config.port, 9001);
        assert_eq!(config.http_timeout_secs, 7);
        assert_eq!(config.transaction_timeout_secs, 70_000_000_000);
        assert_eq!(config.max_concurrent_steps, 4);
    }

    #[test]
    fn test_zero_timeouts_and_slots_fall_back() {
        let config = from_pairs(&[
            ("HTTP_TIMEOUT_SECONDS", "0"),
            ("TRANSACTION_TIMEOUT_SECONDS", "0"),
            ("MAX_CONCURRENT_STEPS", "0"),
        ]);
        assert_eq!(config.http_timeout_secs, 10);
        assert_eq!(config.transaction_timeout_secs, 30);
        assert_eq!(config.max_concurrent_steps, 100);
    }
}
