//! Configuration module for the production desk backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_EVIDENCE_SUGGEST_THRESHOLD: i64 = 3;
const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (disabled when unset)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Evidence count at which an in-progress activation gets a completion suggestion
    pub evidence_suggest_threshold: i64,
    /// Maximum notifications kept in memory
    pub notification_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("DESK_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("DESK_DB_PATH")
            .unwrap_or_else(|_| "./data/desk.sqlite".to_string())
            .into();

        let index_path = env::var("DESK_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = parse_or_default(
            "DESK_BIND_ADDR",
            DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8080))),
        );

        let log_level = env::var("DESK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("DESK_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let evidence_suggest_threshold = parse_or_default(
            "DESK_EVIDENCE_SUGGEST_THRESHOLD",
            DEFAULT_EVIDENCE_SUGGEST_THRESHOLD,
        )
        .max(1);

        let notification_capacity =
            parse_or_default("DESK_NOTIFICATION_CAPACITY", DEFAULT_NOTIFICATION_CAPACITY).max(1);

        Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            log_format,
            evidence_suggest_threshold,
            notification_capacity,
        }
    }
}

/// Read and parse a variable, keeping the default when it is missing or malformed.
fn parse_or_default<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                // The subscriber is not installed yet when config loads.
                eprintln!("warning: ignoring invalid {key}={raw:?}, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases live in one test so they never race on the process environment.
    #[test]
    fn test_config_defaults_and_fallbacks() {
        for key in [
            "DESK_API_PSK",
            "DESK_DB_PATH",
            "DESK_INDEX_PATH",
            "DESK_BIND_ADDR",
            "DESK_LOG_LEVEL",
            "DESK_LOG_FORMAT",
            "DESK_EVIDENCE_SUGGEST_THRESHOLD",
            "DESK_NOTIFICATION_CAPACITY",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/desk.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.evidence_suggest_threshold, 3);
        assert_eq!(config.notification_capacity, 100);

        env::set_var("DESK_BIND_ADDR", "not-an-address");
        env::set_var("DESK_EVIDENCE_SUGGEST_THRESHOLD", "5");
        env::set_var("DESK_NOTIFICATION_CAPACITY", "many");

        let config = Config::from_env();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.evidence_suggest_threshold, 5);
        assert_eq!(config.notification_capacity, 100);

        env::remove_var("DESK_BIND_ADDR");
        env::remove_var("DESK_EVIDENCE_SUGGEST_THRESHOLD");
        env::remove_var("DESK_NOTIFICATION_CAPACITY");
    }
}
