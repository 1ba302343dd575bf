//! Application configuration loaded from environment variables.

use std::time::Duration;

use messaging::{DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_DELIVERIES};
use question_bank::grading::DEFAULT_PASSING_PERCENTAGE;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres for events and the question bank; in-memory when unset
/// - `QUESTION_BANK_FIXTURE`: JSON file of quizzes and questions for the in-memory bank
/// - `PASSING_PERCENTAGE`: pass threshold in percent (default: `50`)
/// - `MAX_DELIVERIES`: deliveries before a message is dead-lettered (default: `5`)
/// - `BROKER_HISTORY`: published messages and dead letters kept for inspection (default: `1024`)
/// - `PROGRESS_SERVICE_URL`: course service base URL; recalculations stay in-process when unset
/// - `RECONCILE_INTERVAL_SECS`: seconds between reconciliation passes (default: `60`)
/// - `PENDING_TIMEOUT_SECS`: age at which a Pending submission is republished (default: `300`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub question_bank_fixture: Option<String>,
    pub passing_percentage: f64,
    pub max_deliveries: u32,
    pub broker_history: usize,
    pub progress_service_url: Option<String>,
    pub reconcile_interval: Duration,
    pub pending_timeout: Duration,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            question_bank_fixture: std::env::var("QUESTION_BANK_FIXTURE")
                .ok()
                .filter(|v| !v.is_empty()),
            passing_percentage: env_parse("PASSING_PERCENTAGE")
                .filter(|p: &f64| (0.0..=100.0).contains(p))
                .unwrap_or(defaults.passing_percentage),
            max_deliveries: env_parse("MAX_DELIVERIES").unwrap_or(defaults.max_deliveries),
            broker_history: env_parse("BROKER_HISTORY").unwrap_or(defaults.broker_history),
            progress_service_url: std::env::var("PROGRESS_SERVICE_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            reconcile_interval: env_parse("RECONCILE_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reconcile_interval),
            pending_timeout: env_parse("PENDING_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pending_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            question_bank_fixture: None,
            passing_percentage: DEFAULT_PASSING_PERCENTAGE,
            max_deliveries: DEFAULT_MAX_DELIVERIES,
            broker_history: DEFAULT_HISTORY_CAPACITY,
            progress_service_url: None,
            reconcile_interval: Duration::from_secs(60),
            pending_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.passing_percentage, 50.0);
        assert_eq!(config.max_deliveries, 5);
        assert_eq!(config.broker_history, 1024);
        assert!(config.database_url.is_none());
        assert_eq!(config.pending_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }
}
