//! Environment constants and path utilities for autoheal.
//!
//! Centralizes the configuration file locations and the environment variables
//! that override configuration values.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const AUTOHEAL_DIR_NAME: &str = ".autoheal";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Standalone configuration file name in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "autoheal.toml";

/// System-wide configuration directory (Unix-like systems)
pub const SYSTEM_CONFIG_DIR: &str = "/etc/autoheal";

/// Environment variables that override configuration values
pub mod vars {
    pub const DOCKER_API_VERSION: &str = "DOCKER_API_VERSION";
    pub const INTERVAL: &str = "AUTOHEAL_INTERVAL";
    pub const BASE_BACKOFF: &str = "AUTOHEAL_BASE_BACKOFF";
    pub const MAX_BACKOFF: &str = "AUTOHEAL_MAX_BACKOFF";
    pub const RESET_WINDOW: &str = "AUTOHEAL_RESET_WINDOW";
    /// Restarts allowed per failure history, 0 for no limit
    pub const MAX_RESTART: &str = "AUTOHEAL_MAX_RESTART";
    pub const CALL_TIMEOUT: &str = "AUTOHEAL_CALL_TIMEOUT";
    pub const RECORD_TTL: &str = "AUTOHEAL_RECORD_TTL";
    pub const DAILY_CLEAR: &str = "AUTOHEAL_DAILY_CLEAR";
    pub const LABEL: &str = "AUTOHEAL_LABEL";
    pub const FAILURE_POLICY: &str = "AUTOHEAL_FAILURE_POLICY";
    /// Overrides only the port of the status listen address
    pub const PORT: &str = "PORT";

    /// Every override variable, in the order they are applied
    pub const ALL: &[&str] = &[
        DOCKER_API_VERSION,
        INTERVAL,
        BASE_BACKOFF,
        MAX_BACKOFF,
        RESET_WINDOW,
        MAX_RESTART,
        CALL_TIMEOUT,
        RECORD_TTL,
        DAILY_CLEAR,
        LABEL,
        FAILURE_POLICY,
        PORT,
    ];
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(AUTOHEAL_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(AUTOHEAL_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build the system-wide config file path
pub fn system_config_file_path() -> PathBuf {
    Path::new(SYSTEM_CONFIG_DIR).join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths() {
        let home_dir = Path::new("/home/user");
        let current_dir = Path::new("/current/project");

        assert_eq!(
            user_config_file_path(home_dir),
            Path::new("/home/user/.autoheal/config.toml")
        );

        assert_eq!(
            local_config_file_path(current_dir),
            Path::new("/current/project/.autoheal/config.toml")
        );

        assert_eq!(
            system_config_file_path(),
            Path::new("/etc/autoheal/config.toml")
        );
    }

    #[test]
    fn test_override_vars_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for var in vars::ALL {
            assert!(seen.insert(*var), "duplicate variable {var}");
        }
    }
}
