//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./autoheal.toml or ./.autoheal/config.toml
//! 2. User config: ~/.autoheal/config.toml
//! 3. System config: /etc/autoheal/config.toml
//! 4. Built-in defaults
//!
//! Values from the file are then overridden by environment variables and
//! finally by command line flags.

use crate::container::{ContainerClientConfig, parse_api_version};
use crate::env::{self, vars};
use crate::heal::{BackoffPolicy, RestartFailurePolicy};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value '{value}' for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error(
        "record_ttl_secs ({ttl_secs}) must exceed interval_secs + call_timeout_secs ({minimum_secs})"
    )]
    TtlTooShort { ttl_secs: u64, minimum_secs: u64 },

    #[error("Invalid Docker API version '{0}', expected major.minor")]
    InvalidApiVersion(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Effective controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Docker Engine API version, as `major.minor`
    pub api_version: String,
    /// Seconds between decision passes
    pub interval_secs: u64,
    pub base_backoff_secs: u64,
    pub max_backoff_secs: u64,
    /// Failure history older than this is discarded
    pub reset_window_secs: u64,
    /// Restarts allowed per failure history. 0 means no limit.
    pub max_restarts: u32,
    /// Deadline for each runtime call
    pub call_timeout_secs: u64,
    /// Evict records unseen for this long. 0 disables eviction.
    pub record_ttl_secs: u64,
    /// Drop settled restart records at every local midnight
    pub daily_clear: bool,
    /// Only remediate containers carrying this label, e.g. `autoheal=true`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_filter: Option<String>,
    pub restart_failure_policy: RestartFailurePolicy,
    /// Status API listen address
    pub listen_addr: SocketAddr,
}

impl Default for HealConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            api_version: ContainerClientConfig::default().api_version,
            interval_secs: 5,
            base_backoff_secs: policy.base_secs,
            max_backoff_secs: policy.max_secs,
            reset_window_secs: policy.reset_window_secs,
            max_restarts: policy.max_restarts,
            call_timeout_secs: 30,
            record_ttl_secs: 0,
            daily_clear: false,
            label_filter: None,
            restart_failure_policy: RestartFailurePolicy::default(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Command line values that take precedence over file and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub interval_secs: Option<u64>,
    pub base_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
    pub reset_window_secs: Option<u64>,
    pub max_restarts: Option<u32>,
    pub listen_addr: Option<SocketAddr>,
}

impl HealConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|var| std_env::var(var).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    /// Empty values are ignored; unparseable ones are an error.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(vars::DOCKER_API_VERSION) {
            self.api_version = value.trim().to_string();
        }
        if let Some(value) = get(vars::INTERVAL) {
            self.interval_secs = parse_env(vars::INTERVAL, &value)?;
        }
        if let Some(value) = get(vars::BASE_BACKOFF) {
            self.base_backoff_secs = parse_env(vars::BASE_BACKOFF, &value)?;
        }
        if let Some(value) = get(vars::MAX_BACKOFF) {
            self.max_backoff_secs = parse_env(vars::MAX_BACKOFF, &value)?;
        }
        if let Some(value) = get(vars::RESET_WINDOW) {
            self.reset_window_secs = parse_env(vars::RESET_WINDOW, &value)?;
        }
        if let Some(value) = get(vars::MAX_RESTART) {
            self.max_restarts = parse_env(vars::MAX_RESTART, &value)?;
        }
        if let Some(value) = get(vars::CALL_TIMEOUT) {
            self.call_timeout_secs = parse_env(vars::CALL_TIMEOUT, &value)?;
        }
        if let Some(value) = get(vars::RECORD_TTL) {
            self.record_ttl_secs = parse_env(vars::RECORD_TTL, &value)?;
        }
        if let Some(value) = get(vars::DAILY_CLEAR) {
            self.daily_clear = parse_env(vars::DAILY_CLEAR, &value)?;
        }
        if let Some(value) = get(vars::LABEL) {
            self.label_filter = Some(value.trim().to_string());
        }
        if let Some(value) = get(vars::FAILURE_POLICY) {
            self.restart_failure_policy = parse_env(vars::FAILURE_POLICY, &value)?;
        }
        if let Some(value) = get(vars::PORT) {
            let port: u16 = parse_env(vars::PORT, &value)?;
            self.listen_addr.set_port(port);
        }

        Ok(())
    }

    /// Apply command line flags.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(v) = overrides.interval_secs {
            self.interval_secs = v;
        }
        if let Some(v) = overrides.base_backoff_secs {
            self.base_backoff_secs = v;
        }
        if let Some(v) = overrides.max_backoff_secs {
            self.max_backoff_secs = v;
        }
        if let Some(v) = overrides.reset_window_secs {
            self.reset_window_secs = v;
        }
        if let Some(v) = overrides.max_restarts {
            self.max_restarts = v;
        }
        if let Some(addr) = overrides.listen_addr {
            self.listen_addr = addr;
        }
    }

    /// Reject zero durations, malformed API versions and a record TTL short
    /// enough to evict a container between two of its passes.
    ///
    /// A maximum backoff below the base is accepted; every wait is then
    /// clamped to the maximum.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("interval_secs", self.interval_secs),
            ("base_backoff_secs", self.base_backoff_secs),
            ("max_backoff_secs", self.max_backoff_secs),
            ("reset_window_secs", self.reset_window_secs),
            ("call_timeout_secs", self.call_timeout_secs),
        ];
        for (field, value) in durations {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        // A pass can start up to a full call timeout after the previous one
        // saw the container.
        let minimum_secs = self.interval_secs.saturating_add(self.call_timeout_secs);
        if self.record_ttl_secs != 0 && self.record_ttl_secs <= minimum_secs {
            return Err(ConfigError::TtlTooShort {
                ttl_secs: self.record_ttl_secs,
                minimum_secs,
            });
        }

        parse_api_version(&self.api_version)
            .map_err(|_| ConfigError::InvalidApiVersion(self.api_version.clone()))?;

        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.base_backoff_secs,
            self.max_backoff_secs,
            self.reset_window_secs,
        )
        .with_max_restarts(self.max_restarts)
    }

    pub fn client_config(&self) -> ContainerClientConfig {
        ContainerClientConfig {
            api_version: self.api_version.clone(),
            ..ContainerClientConfig::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<HealConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return HealConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(HealConfig::default())
    }

    /// Build the effective configuration: the explicit file or the discovered
    /// one, then environment, then command line flags, then validation.
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<HealConfig> {
        let mut config = match config_file {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                HealConfig::from_toml_file(path)?
            }
            None => Self::discover_config()?,
        };

        config.apply_env()?;
        config.apply_overrides(overrides);
        config.validate()?;

        debug!(?config, "Effective configuration");
        Ok(config)
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::get_config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(env::system_config_file_path());

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }

        println!();
        println!("Environment overrides:");
        for var in vars::ALL {
            match std_env::var(var) {
                Ok(value) => println!("  {} = {}", var, value),
                Err(_) => println!("  {} (unset)", var),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = HealConfig::default();
        config.validate().unwrap();

        assert_eq!(config.api_version, "1.39");
        assert_eq!(config.interval_secs, 5);
        assert_eq!(config.record_ttl_secs, 0);
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.backoff_policy(), BackoffPolicy::new(5, 300, 3600));
    }

    #[test]
    fn test_config_serialization() {
        let config = HealConfig::default();
        let toml_string = config.to_toml_string().unwrap();

        assert!(toml_string.contains("restart_failure_policy = \"advance\""));
        assert!(!toml_string.contains("label_filter"));

        let deserialized: HealConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: HealConfig = toml::from_str(
            r#"
            interval_secs = 10
            label_filter = "autoheal=true"
            restart_failure_policy = "rollback"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.label_filter.as_deref(), Some("autoheal=true"));
        assert_eq!(config.restart_failure_policy, RestartFailurePolicy::Rollback);
        assert_eq!(config.base_backoff_secs, 5);
        assert_eq!(config.max_backoff_secs, 300);
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("autoheal.toml");

        let original = HealConfig {
            interval_secs: 7,
            label_filter: Some("autoheal=true".to_string()),
            ..HealConfig::default()
        };

        original.to_toml_file(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = HealConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let temp_dir = TempDir::new().unwrap();

        let missing = HealConfig::from_toml_file(temp_dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let bad_path = temp_dir.path().join("bad.toml");
        fs::write(&bad_path, "interval_secs = \"soon\"").unwrap();
        let bad = HealConfig::from_toml_file(&bad_path);
        assert!(matches!(bad, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HealConfig::default();
        config
            .apply_env_from(lookup(&[
                ("DOCKER_API_VERSION", "1.41"),
                ("AUTOHEAL_INTERVAL", "2"),
                ("AUTOHEAL_MAX_BACKOFF", " 120 "),
                ("AUTOHEAL_LABEL", "autoheal=true"),
                ("AUTOHEAL_FAILURE_POLICY", "rollback"),
                ("AUTOHEAL_RECORD_TTL", "600"),
                ("AUTOHEAL_DAILY_CLEAR", "true"),
                ("AUTOHEAL_MAX_RESTART", "3"),
                ("PORT", "9090"),
            ]))
            .unwrap();

        assert_eq!(config.api_version, "1.41");
        assert_eq!(config.interval_secs, 2);
        assert_eq!(config.max_backoff_secs, 120);
        assert_eq!(config.label_filter.as_deref(), Some("autoheal=true"));
        assert_eq!(config.restart_failure_policy, RestartFailurePolicy::Rollback);
        assert_eq!(config.record_ttl_secs, 600);
        assert!(config.daily_clear);
        assert_eq!(config.max_restarts, 3);
        assert_eq!(config.backoff_policy().max_restarts, 3);
        assert_eq!(config.listen_addr, "0.0.0.0:9090".parse().unwrap());
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        let mut config = HealConfig::default();
        config
            .apply_env_from(lookup(&[("AUTOHEAL_INTERVAL", "  ")]))
            .unwrap();
        assert_eq!(config.interval_secs, 5);
    }

    #[test]
    fn test_unparseable_env_value_is_rejected() {
        let mut config = HealConfig::default();
        let err = config
            .apply_env_from(lookup(&[("AUTOHEAL_BASE_BACKOFF", "five")]))
            .unwrap_err();

        match err {
            ConfigError::InvalidEnv { var, value, .. } => {
                assert_eq!(var, "AUTOHEAL_BASE_BACKOFF");
                assert_eq!(value, "five");
            }
            other => panic!("Expected InvalidEnv, got {other:?}"),
        }

        let mut config = HealConfig::default();
        assert!(
            config
                .apply_env_from(lookup(&[("AUTOHEAL_FAILURE_POLICY", "retry")]))
                .is_err()
        );
        assert!(config.apply_env_from(lookup(&[("PORT", "70000")])).is_err());
        assert!(
            config
                .apply_env_from(lookup(&[("AUTOHEAL_MAX_RESTART", "-1")]))
                .is_err()
        );
    }

    #[test]
    fn test_validation_rejects_zero_durations() {
        for field in [
            "interval_secs",
            "base_backoff_secs",
            "max_backoff_secs",
            "reset_window_secs",
            "call_timeout_secs",
        ] {
            let mut config = HealConfig::default();
            match field {
                "interval_secs" => config.interval_secs = 0,
                "base_backoff_secs" => config.base_backoff_secs = 0,
                "max_backoff_secs" => config.max_backoff_secs = 0,
                "reset_window_secs" => config.reset_window_secs = 0,
                _ => config.call_timeout_secs = 0,
            }

            match config.validate() {
                Err(ConfigError::ZeroDuration { field: reported }) => assert_eq!(reported, field),
                other => panic!("Expected ZeroDuration for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validation_rejects_ttl_within_one_pass() {
        // interval 5 + call timeout 30
        for ttl in [1, 10, 35] {
            let config = HealConfig {
                record_ttl_secs: ttl,
                ..HealConfig::default()
            };
            match config.validate() {
                Err(ConfigError::TtlTooShort {
                    ttl_secs,
                    minimum_secs,
                }) => {
                    assert_eq!(ttl_secs, ttl);
                    assert_eq!(minimum_secs, 35);
                }
                other => panic!("Expected TtlTooShort for {ttl}, got {other:?}"),
            }
        }

        for ttl in [0, 36, 600] {
            let config = HealConfig {
                record_ttl_secs: ttl,
                ..HealConfig::default()
            };
            config.validate().unwrap();
        }

        let huge = HealConfig {
            interval_secs: u64::MAX,
            record_ttl_secs: u64::MAX,
            ..HealConfig::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(ConfigError::TtlTooShort { .. })
        ));
    }

    #[test]
    fn test_validation_accepts_max_below_base() {
        let config = HealConfig {
            base_backoff_secs: 60,
            max_backoff_secs: 10,
            ..HealConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.backoff_policy().wait_secs(0), 10);
    }

    #[test]
    fn test_validation_rejects_bad_api_version() {
        let config = HealConfig {
            api_version: "latest".to_string(),
            ..HealConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidApiVersion(_))
        ));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = HealConfig::default();
        config
            .apply_env_from(lookup(&[("AUTOHEAL_INTERVAL", "2")]))
            .unwrap();
        config.apply_overrides(&ConfigOverrides {
            interval_secs: Some(9),
            max_restarts: Some(4),
            listen_addr: Some("127.0.0.1:3000".parse().unwrap()),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.interval_secs, 9);
        assert_eq!(config.max_restarts, 4);
        assert_eq!(config.listen_addr.port(), 3000);
    }

    #[test]
    #[serial]
    fn test_load_layers_file_env_and_flags() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("autoheal.toml");
        fs::write(
            &config_path,
            "interval_secs = 10\nbase_backoff_secs = 8\nmax_backoff_secs = 100\n",
        )
        .unwrap();

        // SAFETY: serialized with every other test touching the environment.
        unsafe {
            std_env::set_var(vars::BASE_BACKOFF, "3");
        }

        let result = ConfigDiscovery::load(
            Some(&config_path),
            &ConfigOverrides {
                max_backoff_secs: Some(50),
                ..ConfigOverrides::default()
            },
        );

        unsafe {
            std_env::remove_var(vars::BASE_BACKOFF);
        }

        let config = result.unwrap();
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.base_backoff_secs, 3);
        assert_eq!(config.max_backoff_secs, 50);
    }

    #[test]
    #[serial]
    fn test_load_fails_on_invalid_env() {
        unsafe {
            std_env::set_var(vars::CALL_TIMEOUT, "never");
        }

        let result = ConfigDiscovery::load(None, &ConfigOverrides::default());

        unsafe {
            std_env::remove_var(vars::CALL_TIMEOUT);
        }

        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn test_config_candidates() {
        let candidates = ConfigDiscovery::get_config_candidates();

        assert!(!candidates.is_empty());
        assert_eq!(candidates[0].file_name().unwrap(), "autoheal.toml");
    }
}
