//! CLI-specific functionality for autoheal
//!
//! This module contains argument parsing and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, ExecutionMode, RunConfig};
pub use config::{ConfigDiscovery, ConfigError, ConfigOverrides, HealConfig};
