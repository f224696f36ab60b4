//! Process configuration read from environment variables.

use std::time::Duration;

use wallet_infra::db::{ConfigError, PoolConfig, parse_var};

/// Runtime configuration for the API binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Postgres DSN; `None` only when running on the in-memory store.
    pub database_url: Option<String>,
    pub use_in_memory_store: bool,
    pub bind_addr: String,
    /// Upper bound on one ledger call made on behalf of a request.
    pub request_timeout: Duration,
    pub pool: PoolConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let use_in_memory_store = parse_var(&lookup, "USE_IN_MEMORY_STORE")?.unwrap_or(false);
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if database_url.is_none() && !use_in_memory_store {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let request_timeout_secs: u64 = parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?.unwrap_or(10);
        if request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            use_in_memory_store,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            request_timeout: Duration::from_secs(request_timeout_secs),
            pool: PoolConfig::from_lookup(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn database_url_is_required_for_postgres() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
        assert_eq!(
            config(&[("DATABASE_URL", "  ")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
    }

    #[test]
    fn defaults_with_database_url() {
        let cfg = config(&[("DATABASE_URL", "postgres://wallet@localhost/wallet")]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert!(!cfg.use_in_memory_store);
        assert_eq!(cfg.pool, PoolConfig::default());
    }

    #[test]
    fn in_memory_mode_needs_no_database() {
        let cfg = config(&[
            ("USE_IN_MEMORY_STORE", "true"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("REQUEST_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert!(cfg.use_in_memory_store);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let err = config(&[("USE_IN_MEMORY_STORE", "true"), ("REQUEST_TIMEOUT_SECS", "0")])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                value: "0".to_string()
            }
        );
    }

    #[test]
    fn malformed_flag_is_rejected() {
        let err = config(&[("USE_IN_MEMORY_STORE", "yes")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "USE_IN_MEMORY_STORE", .. }));
    }
}
