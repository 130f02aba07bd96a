//! Configuration management for the EventPass server.
//!
//! Loaded once from environment variables at startup and passed explicitly
//! to every component. Nothing reads the environment after this.

use eventpass_core::HmacSecret;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but does not parse.
    #[error("Invalid value for {var}: {value:?}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },
}

/// Longest accepted ticket validity, in hours.
pub const MAX_TICKET_HORIZON_HOURS: i64 = 24 * 366;

/// Database failover policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverModeSetting {
    /// Primary and replica both live, swapped by the health monitor
    Hot,
    /// Primary if reachable at startup, otherwise the replica, for good
    Cold,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared HMAC key for ticket signatures
    pub hmac_secret: HmacSecret,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Check-in and sweeper timing
    pub check_in: CheckInSettings,
    /// HTTP server configuration
    pub server: ServerConfig,
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Primary connection URL
    pub url: String,
    /// Replica (hot) or fallback (cold) URL. Required in hot mode; without
    /// it cold mode runs on the primary alone.
    pub replica_url: Option<String>,
    /// Failover policy
    pub failover_mode: FailoverModeSetting,
    /// Time between primary health probes
    pub probe_interval: Duration,
    /// Deadline per query
    pub query_timeout: Duration,
}

/// Redis configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Deadline per command
    pub command_timeout: Duration,
}

/// Check-in and expiry timing.
#[derive(Debug, Clone)]
pub struct CheckInSettings {
    /// Dedup window for repeated scans
    pub dedup_ttl: Duration,
    /// Time between expiry sweeps
    pub sweep_interval: Duration,
    /// Validity of a freshly issued ticket
    pub ticket_horizon: chrono::Duration,
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Prometheus exporter port
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is
    /// invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let failover_mode = match vars.get("FAILOVER_MODE").as_deref() {
            None | Some("hot") => FailoverModeSetting::Hot,
            Some("cold") => FailoverModeSetting::Cold,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "FAILOVER_MODE",
                    value: other.to_string(),
                });
            }
        };

        let replica_url = vars.get("REPLICA_DATABASE_URL");
        if failover_mode == FailoverModeSetting::Hot && replica_url.is_none() {
            return Err(ConfigError::Missing("REPLICA_DATABASE_URL"));
        }

        let horizon_hours: i64 = vars.parse("TICKET_HORIZON_HOURS", 24)?;
        let ticket_horizon = (1..=MAX_TICKET_HORIZON_HOURS)
            .contains(&horizon_hours)
            .then(|| chrono::Duration::try_hours(horizon_hours))
            .flatten()
            .ok_or_else(|| ConfigError::Invalid {
                var: "TICKET_HORIZON_HOURS",
                value: horizon_hours.to_string(),
            })?;

        Ok(Self {
            hmac_secret: HmacSecret::new(vars.required("HMAC_SECRET")?),
            database: DatabaseConfig {
                url: vars.required("DATABASE_URL")?,
                replica_url,
                failover_mode,
                probe_interval: vars.secs("HEALTH_PROBE_INTERVAL_SECS", 5)?,
                query_timeout: vars.secs("QUERY_TIMEOUT_SECS", 5)?,
            },
            redis: RedisConfig {
                url: vars
                    .get("REDIS_URL")
                    .unwrap_or_else(|| "redis://localhost:6379".to_string()),
                command_timeout: vars.secs("REDIS_TIMEOUT_SECS", 1)?,
            },
            check_in: CheckInSettings {
                dedup_ttl: vars.secs("DEDUP_TTL_SECS", 5)?,
                sweep_interval: vars.secs("EXPIRY_SWEEP_INTERVAL_SECS", 60)?,
                ticket_horizon,
            },
            server: ServerConfig {
                host: vars.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: vars.parse("PORT", 8080)?,
                metrics_port: vars.parse("METRICS_PORT", 9090)?,
            },
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    /// Non-empty value of `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parse<T: std::str::FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: key,
                value: raw,
            }),
        }
    }

    /// Whole seconds, must be positive.
    fn secs(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        match self.parse(key, default)? {
            0 => Err(ConfigError::Invalid {
                var: key,
                value: "0".to_string(),
            }),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("HMAC_SECRET", "k"),
        ("DATABASE_URL", "postgres://localhost/eventpass"),
        ("REPLICA_DATABASE_URL", "postgres://replica/eventpass"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();

        assert_eq!(config.database.failover_mode, FailoverModeSetting::Hot);
        assert_eq!(config.database.probe_interval, Duration::from_secs(5));
        assert_eq!(config.database.query_timeout, Duration::from_secs(5));
        assert_eq!(config.check_in.dedup_ttl, Duration::from_secs(5));
        assert_eq!(config.check_in.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.check_in.ticket_horizon, chrono::Duration::hours(24));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.metrics_port, 9090);
        assert_eq!(config.redis.url, "redis://localhost:6379");
    }

    #[test]
    fn test_missing_secret() {
        let err = load(&REQUIRED[1..]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("HMAC_SECRET"));
    }

    #[test]
    fn test_hot_mode_requires_replica() {
        let err = load(&REQUIRED[..2]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("REPLICA_DATABASE_URL"));
    }

    #[test]
    fn test_cold_mode_without_replica() {
        let mut pairs = REQUIRED[..2].to_vec();
        pairs.push(("FAILOVER_MODE", "cold"));

        let config = load(&pairs).unwrap();

        assert_eq!(config.database.failover_mode, FailoverModeSetting::Cold);
        assert_eq!(config.database.replica_url, None);
    }

    #[test]
    fn test_empty_database_url_is_missing() {
        let err = load(&[("HMAC_SECRET", "k"), ("DATABASE_URL", "  "), REQUIRED[2]]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("FAILOVER_MODE", "cold"),
            ("DEDUP_TTL_SECS", "10"),
            ("TICKET_HORIZON_HOURS", "48"),
            ("PORT", "3000"),
        ]);

        let config = load(&pairs).unwrap();

        assert_eq!(config.database.failover_mode, FailoverModeSetting::Cold);
        assert_eq!(
            config.database.replica_url.as_deref(),
            Some("postgres://replica/eventpass")
        );
        assert_eq!(config.check_in.dedup_ttl, Duration::from_secs(10));
        assert_eq!(config.check_in.ticket_horizon, chrono::Duration::hours(48));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("FAILOVER_MODE", "lukewarm"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::Invalid { var: "FAILOVER_MODE", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEDUP_TTL_SECS", "0"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::Invalid { var: "DEDUP_TTL_SECS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
    }

    #[test]
    fn test_ticket_horizon_bounds() {
        for raw in ["0", "-3", "2500000000", "9223372036854775807"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("TICKET_HORIZON_HOURS", raw));
            assert_eq!(
                load(&pairs).unwrap_err(),
                ConfigError::Invalid {
                    var: "TICKET_HORIZON_HOURS",
                    value: raw.to_string(),
                }
            );
        }

        let max = MAX_TICKET_HORIZON_HOURS.to_string();
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TICKET_HORIZON_HOURS", max.as_str()));
        let config = load(&pairs).unwrap();
        assert_eq!(
            config.check_in.ticket_horizon,
            chrono::Duration::hours(MAX_TICKET_HORIZON_HOURS)
        );
    }

    #[test]
    fn test_secret_is_not_printed() {
        let config = load(&[("HMAC_SECRET", "super-secret"), REQUIRED[1], REQUIRED[2]]).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
