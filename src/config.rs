//! Server configuration
//!
//! Every setting comes from a `BINIX_*` environment variable and falls back to
//! a default when unset. A variable that is set but cannot be parsed is an
//! error rather than silently ignored.
//!
//! ## Environment Variables
//! - `BINIX_LISTEN_ADDR`: socket address to bind (`0.0.0.0:3000`)
//! - `BINIX_DB_PATH`: SQLite file; unset keeps the store in memory
//! - `BINIX_SAMPLE_INTERVAL_SECS`: host sampling period (5)
//! - `BINIX_FETCH_TIMEOUT_SECS`: per-request network timeout (30)
//! - `BINIX_GATE_FETCHES`: route resource fetches through the bandwidth gate (false)
//! - `BINIX_MAX_CONCURRENT_FETCHES`: gate capacity (8)
//! - `BINIX_HOT_CACHE_TTL_SECS` / `BINIX_HOT_CACHE_MAX_BYTES`: hot cache limits (300 / 256 MiB)
//! - `BINIX_MAX_RESOURCE_BYTES`: most of one fetched body that is read (16 MiB)
//! - `BINIX_METRIC_TABLE_CAPACITY`: in-memory metric table bound (1024)
//! - `BINIX_RESOURCE_RETENTION`: records kept per resource URL, 0 for all (32)
//! - `BINIX_SNAPSHOT_RETENTION`: snapshots kept, 0 for all (720)
//! - `BINIX_REQUEST_LOG_RETENTION`: request log rows kept, 0 for all (10000)
//! - `BINIX_DRAIN_TIMEOUT_SECS`: shutdown wait for background fetches (10)
//! - `BINIX_BODY_LIMIT_BYTES`: max request body size (10 MiB)

use crate::metrics::{
    DEFAULT_REQUEST_RETENTION, DEFAULT_RESOURCE_RETENTION, DEFAULT_SAMPLE_INTERVAL,
    DEFAULT_SNAPSHOT_RETENTION, DEFAULT_TABLE_CAPACITY,
};
use crate::network::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_HOT_CACHE_MAX_BYTES, DEFAULT_HOT_CACHE_TTL, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MAX_CONCURRENT,
};
use crate::utils::{AccelError, Result};
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_LISTEN_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000);
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Runtime settings for the acceleration server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// `None` keeps the store in memory
    pub db_path: Option<PathBuf>,
    pub sample_interval: Duration,
    pub fetch_timeout: Duration,
    pub gate_fetches: bool,
    pub max_concurrent_fetches: usize,
    pub hot_cache_ttl: Duration,
    /// Byte budget over every cached body
    pub hot_cache_max_bytes: u64,
    /// Bodies past this are not read in full and never cached
    pub max_resource_bytes: usize,
    pub metric_table_capacity: usize,
    /// `None` keeps every record
    pub resource_retention: Option<usize>,
    pub snapshot_retention: Option<usize>,
    pub request_retention: Option<usize>,
    pub drain_timeout: Duration,
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR,
            db_path: None,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            gate_fetches: false,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT,
            hot_cache_ttl: DEFAULT_HOT_CACHE_TTL,
            hot_cache_max_bytes: DEFAULT_HOT_CACHE_MAX_BYTES,
            max_resource_bytes: DEFAULT_MAX_BODY_BYTES,
            metric_table_capacity: DEFAULT_TABLE_CAPACITY,
            resource_retention: Some(DEFAULT_RESOURCE_RETENTION),
            snapshot_retention: Some(DEFAULT_SNAPSHOT_RETENTION),
            request_retention: Some(DEFAULT_REQUEST_RETENTION),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names
    ///
    /// # Errors
    /// Returns `AccelError::Config` if a variable is set but invalid, or if a
    /// value that must be positive is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Lookup(lookup);

        let config = Self {
            listen_addr: env.parse("BINIX_LISTEN_ADDR")?.unwrap_or(DEFAULT_LISTEN_ADDR),
            db_path: env.get("BINIX_DB_PATH").map(PathBuf::from),
            sample_interval: env
                .secs("BINIX_SAMPLE_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL),
            fetch_timeout: env
                .secs("BINIX_FETCH_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_FETCH_TIMEOUT),
            gate_fetches: env.parse("BINIX_GATE_FETCHES")?.unwrap_or(false),
            max_concurrent_fetches: env
                .parse("BINIX_MAX_CONCURRENT_FETCHES")?
                .unwrap_or(DEFAULT_MAX_CONCURRENT),
            hot_cache_ttl: env
                .secs("BINIX_HOT_CACHE_TTL_SECS")?
                .unwrap_or(DEFAULT_HOT_CACHE_TTL),
            hot_cache_max_bytes: env
                .parse("BINIX_HOT_CACHE_MAX_BYTES")?
                .unwrap_or(DEFAULT_HOT_CACHE_MAX_BYTES),
            max_resource_bytes: env
                .parse("BINIX_MAX_RESOURCE_BYTES")?
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            metric_table_capacity: env
                .parse("BINIX_METRIC_TABLE_CAPACITY")?
                .unwrap_or(DEFAULT_TABLE_CAPACITY),
            resource_retention: env
                .retention("BINIX_RESOURCE_RETENTION")?
                .unwrap_or(Some(DEFAULT_RESOURCE_RETENTION)),
            snapshot_retention: env
                .retention("BINIX_SNAPSHOT_RETENTION")?
                .unwrap_or(Some(DEFAULT_SNAPSHOT_RETENTION)),
            request_retention: env
                .retention("BINIX_REQUEST_LOG_RETENTION")?
                .unwrap_or(Some(DEFAULT_REQUEST_RETENTION)),
            drain_timeout: env
                .secs("BINIX_DRAIN_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_DRAIN_TIMEOUT),
            body_limit: env.parse("BINIX_BODY_LIMIT_BYTES")?.unwrap_or(DEFAULT_BODY_LIMIT),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or disable the server
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("BINIX_SAMPLE_INTERVAL_SECS", self.sample_interval.is_zero()),
            ("BINIX_FETCH_TIMEOUT_SECS", self.fetch_timeout.is_zero()),
            ("BINIX_MAX_CONCURRENT_FETCHES", self.max_concurrent_fetches == 0),
            ("BINIX_HOT_CACHE_TTL_SECS", self.hot_cache_ttl.is_zero()),
            ("BINIX_HOT_CACHE_MAX_BYTES", self.hot_cache_max_bytes == 0),
            ("BINIX_MAX_RESOURCE_BYTES", self.max_resource_bytes == 0),
            ("BINIX_METRIC_TABLE_CAPACITY", self.metric_table_capacity == 0),
            ("BINIX_BODY_LIMIT_BYTES", self.body_limit == 0),
        ];
        match positive.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(AccelError::Config(format!("{name} must be greater than zero"))),
            None => Ok(()),
        }
    }
}

struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| AccelError::Config(format!("invalid {name}={raw:?}: {e}")))
            })
            .transpose()
    }

    fn secs(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_secs))
    }

    /// `Some(None)` means unlimited
    fn retention(&self, name: &str) -> Result<Option<Option<usize>>> {
        Ok(self.parse::<usize>(name)?.map(|keep| (keep > 0).then_some(keep)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(load(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("BINIX_LISTEN_ADDR", "127.0.0.1:8080"),
            ("BINIX_DB_PATH", "/tmp/binix.db"),
            ("BINIX_SAMPLE_INTERVAL_SECS", "1"),
            ("BINIX_GATE_FETCHES", "true"),
            ("BINIX_MAX_CONCURRENT_FETCHES", "2"),
            ("BINIX_RESOURCE_RETENTION", "0"),
            ("BINIX_SNAPSHOT_RETENTION", "10"),
            ("BINIX_REQUEST_LOG_RETENTION", "0"),
            ("BINIX_HOT_CACHE_MAX_BYTES", "1048576"),
            ("BINIX_MAX_RESOURCE_BYTES", "65536"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/binix.db")));
        assert_eq!(config.sample_interval, Duration::from_secs(1));
        assert!(config.gate_fetches);
        assert_eq!(config.max_concurrent_fetches, 2);
        assert_eq!(config.resource_retention, None);
        assert_eq!(config.snapshot_retention, Some(10));
        assert_eq!(config.request_retention, None);
        assert_eq!(config.hot_cache_max_bytes, 1024 * 1024);
        assert_eq!(config.max_resource_bytes, 64 * 1024);
    }

    #[test]
    fn test_blank_value_uses_default() {
        let config = load(&[("BINIX_FETCH_TIMEOUT_SECS", "  ")]).unwrap();
        assert_eq!(config.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn test_unparsable_value_is_error() {
        let err = load(&[("BINIX_MAX_CONCURRENT_FETCHES", "many")]).unwrap_err();
        assert!(matches!(err, AccelError::Config(ref msg) if msg.contains("BINIX_MAX_CONCURRENT_FETCHES")));
        assert!(load(&[("BINIX_GATE_FETCHES", "yes")]).is_err());
        assert!(load(&[("BINIX_LISTEN_ADDR", "nowhere")]).is_err());
    }

    #[test]
    fn test_zero_rejected() {
        for name in [
            "BINIX_SAMPLE_INTERVAL_SECS",
            "BINIX_FETCH_TIMEOUT_SECS",
            "BINIX_MAX_CONCURRENT_FETCHES",
            "BINIX_METRIC_TABLE_CAPACITY",
            "BINIX_HOT_CACHE_MAX_BYTES",
            "BINIX_MAX_RESOURCE_BYTES",
        ] {
            assert!(load(&[(name, "0")]).is_err(), "{name}=0 accepted");
        }
    }
}
