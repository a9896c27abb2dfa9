//! # Autoheal
//!
//! A controller that watches a container runtime for running containers whose
//! health check fails and restarts them, spacing repeated restarts of the same
//! container with exponential backoff.
//!
//! ## Architecture Overview
//!
//! - **[`container`]**: Docker/Podman access behind the [`RuntimeGateway`] trait
//! - **[`heal`]**: restart records, backoff policy, decision engine and scheduler
//! - **[`status`]**: read-only HTTP view of the restart records
//! - **[`cli`]**: argument parsing and configuration discovery
//!
//! ## Backoff
//!
//! A container seen unhealthy for the first time is restarted at once. While
//! it stays unhealthy, the n-th following restart waits
//! `min(max_backoff, base_backoff * 2^n)` seconds. A failure history older
//! than the reset window is discarded and the next restart is immediate again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use autoheal::{BackoffPolicy, ContainerClient, DockerGateway, Remediator, RestartStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = DockerGateway::new(ContainerClient::new().await?, None);
//!     let remediator = Remediator::new(
//!         Arc::new(gateway),
//!         RestartStore::new(),
//!         BackoffPolicy::default(),
//!     );
//!
//!     let report = remediator.run_pass().await;
//!     println!("restarted {} containers", report.restarted);
//!     Ok(())
//! }
//! ```

/// Container runtime access.
///
/// The [`RuntimeGateway`](container::RuntimeGateway) trait and its bollard
/// backed Docker implementation.
pub mod container;

/// Unhealthy-container remediation.
pub mod heal;

/// Status HTTP API.
pub mod status;

/// Environment constants and path utilities.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use cli::{ConfigDiscovery, ConfigError, HealConfig};
pub use container::{
    ContainerClient, ContainerClientConfig, ContainerError, DockerGateway, RuntimeGateway,
    UnhealthyContainer,
};
pub use heal::{
    BackoffPolicy, Decision, PassReport, Remediator, RestartFailurePolicy, RestartRecord,
    RestartStore, Scheduler,
};
