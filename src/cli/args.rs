//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `run`: Start the controller
//! - `check-config`: Load, validate and print the effective configuration
//! - `show-config`: Show configuration discovery information

use super::config::ConfigOverrides;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    CheckConfig { config_file: Option<PathBuf> },
    ShowConfig,
}

#[derive(Debug)]
pub struct RunConfig {
    pub config_file: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    pub status_server: bool,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "autoheal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Restarts running containers whose health check fails, with exponential backoff")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the controller
    Run {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Seconds between decision passes
        #[arg(long = "interval", value_name = "SECS")]
        interval: Option<u64>,
        /// Base backoff in seconds
        #[arg(long = "base-backoff", value_name = "SECS")]
        base_backoff: Option<u64>,
        /// Maximum backoff in seconds
        #[arg(long = "max-backoff", value_name = "SECS")]
        max_backoff: Option<u64>,
        /// Seconds after which a failure history is discarded
        #[arg(long = "reset-window", value_name = "SECS")]
        reset_window: Option<u64>,
        /// Restarts allowed per failure history, 0 for no limit
        #[arg(long = "max-restarts", value_name = "COUNT")]
        max_restarts: Option<u32>,
        /// Status API listen address
        #[arg(long = "listen", value_name = "ADDR")]
        listen: Option<SocketAddr>,
        /// Do not start the status API
        #[arg(long = "no-status-server")]
        no_status_server: bool,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Load, validate and print the effective configuration
    CheckConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                config,
                interval,
                base_backoff,
                max_backoff,
                reset_window,
                max_restarts,
                listen,
                no_status_server,
                verbose,
            }) => Ok(ExecutionMode::Run(RunConfig {
                config_file: config.clone(),
                overrides: ConfigOverrides {
                    interval_secs: *interval,
                    base_backoff_secs: *base_backoff,
                    max_backoff_secs: *max_backoff,
                    reset_window_secs: *reset_window,
                    max_restarts: *max_restarts,
                    listen_addr: *listen,
                },
                status_server: !*no_status_server,
                verbose: *verbose,
            })),
            Some(Commands::CheckConfig { config }) => Ok(ExecutionMode::CheckConfig {
                config_file: config.clone(),
            }),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            None => Err(
                "No command specified. Use 'autoheal --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_defaults() {
        let args = Args::try_parse_from(["autoheal", "run"]).unwrap();

        match args.mode().unwrap() {
            ExecutionMode::Run(config) => {
                assert!(config.config_file.is_none());
                assert_eq!(config.overrides, ConfigOverrides::default());
                assert!(config.status_server);
                assert!(!config.verbose);
            }
            other => panic!("Expected Run mode, got {other:?}"),
        }
    }

    #[test]
    fn test_run_command_with_flags() {
        let args = Args::try_parse_from([
            "autoheal",
            "run",
            "-c",
            "/etc/autoheal/custom.toml",
            "--interval",
            "2",
            "--base-backoff",
            "10",
            "--max-backoff",
            "600",
            "--reset-window",
            "7200",
            "--max-restarts",
            "3",
            "--listen",
            "127.0.0.1:9000",
            "--no-status-server",
            "-v",
        ])
        .unwrap();

        match args.mode().unwrap() {
            ExecutionMode::Run(config) => {
                assert_eq!(
                    config.config_file,
                    Some(PathBuf::from("/etc/autoheal/custom.toml"))
                );
                assert_eq!(config.overrides.interval_secs, Some(2));
                assert_eq!(config.overrides.base_backoff_secs, Some(10));
                assert_eq!(config.overrides.max_backoff_secs, Some(600));
                assert_eq!(config.overrides.reset_window_secs, Some(7200));
                assert_eq!(config.overrides.max_restarts, Some(3));
                assert_eq!(
                    config.overrides.listen_addr,
                    Some("127.0.0.1:9000".parse().unwrap())
                );
                assert!(!config.status_server);
                assert!(config.verbose);
            }
            other => panic!("Expected Run mode, got {other:?}"),
        }
    }

    #[test]
    fn test_run_rejects_bad_values() {
        assert!(Args::try_parse_from(["autoheal", "run", "--interval", "-1"]).is_err());
        assert!(Args::try_parse_from(["autoheal", "run", "--listen", "localhost"]).is_err());
    }

    #[test]
    fn test_check_config_command() {
        let args = Args::try_parse_from(["autoheal", "check-config", "--config", "a.toml"]).unwrap();

        match args.mode().unwrap() {
            ExecutionMode::CheckConfig { config_file } => {
                assert_eq!(config_file, Some(PathBuf::from("a.toml")));
            }
            other => panic!("Expected CheckConfig mode, got {other:?}"),
        }
    }

    #[test]
    fn test_show_config_command() {
        let args = Args::try_parse_from(["autoheal", "show-config"]).unwrap();
        assert!(matches!(args.mode().unwrap(), ExecutionMode::ShowConfig));
    }

    #[test]
    fn test_no_command_error() {
        let args = Args { command: None };
        assert!(args.mode().is_err());
    }
}
