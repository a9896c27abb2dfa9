//! Container runtime access layer.
//!
//! This module is the only place that talks to Docker/Podman. It exposes the
//! [`RuntimeGateway`] trait, which is everything the remediation engine needs
//! from a runtime: a snapshot of unhealthy running containers and a way to
//! restart one of them.
//!
//! ## Architecture
//!
//! - [`client`]: bollard client construction with API version pinning
//! - [`gateway`]: the [`RuntimeGateway`] trait and its Docker implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use autoheal::container::{ContainerClient, ContainerClientConfig, DockerGateway, RuntimeGateway};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ContainerClient::with_config(ContainerClientConfig::default()).await?;
//!     let gateway = DockerGateway::new(client, None);
//!
//!     for container in gateway.list_unhealthy().await? {
//!         println!("{} is unhealthy ({})", container.display_name(), container.status);
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod gateway;

pub use client::{ContainerClient, ContainerClientConfig, RuntimeType, parse_api_version};
pub use gateway::{DockerGateway, RuntimeGateway, UnhealthyContainer};

/// Container runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    ApiError(#[from] bollard::errors::Error),

    /// Container not found
    #[error("Container not found: {0}")]
    NotFound(String),

    /// Connection to the runtime could not be established
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Invalid client configuration (e.g. malformed API version)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A runtime call did not complete within its deadline
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// General error
    #[error("Container error: {0}")]
    Other(String),
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
