//! Docker/Podman client wrapper.
//!
//! Provides a simplified interface to the bollard Docker API with API version
//! pinning, connection fallback strategies, and health checking.

use crate::container::{ContainerError, Result};
use bollard::{ClientVersion, Docker};
use std::sync::Arc;
use tracing::{debug, info};

/// Default Docker daemon socket on Unix hosts.
#[cfg(unix)]
const DEFAULT_DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";

/// Container client configuration.
#[derive(Debug, Clone)]
pub struct ContainerClientConfig {
    /// Docker Engine API version, as `major.minor`
    pub api_version: String,
    /// Connection timeout in seconds
    pub timeout: u64,
}

impl Default for ContainerClientConfig {
    fn default() -> Self {
        Self {
            api_version: "1.39".to_string(),
            timeout: 120,
        }
    }
}

/// Parse a `major.minor` Docker API version string.
///
/// # Errors
///
/// Returns [`ContainerError::ConfigError`] if the string is not two
/// dot-separated integers.
pub fn parse_api_version(version: &str) -> Result<ClientVersion> {
    let invalid = || ContainerError::ConfigError(format!("Invalid API version: {version:?}"));

    let (major, minor) = version.trim().split_once('.').ok_or_else(invalid)?;
    let major_version = major.parse::<usize>().map_err(|_| invalid())?;
    let minor_version = minor.parse::<usize>().map_err(|_| invalid())?;

    Ok(ClientVersion {
        major_version,
        minor_version,
    })
}

/// Docker/Podman API client wrapper.
///
/// Manages connection to Docker or Podman daemon with automatic fallback
/// and health checking.
#[derive(Clone)]
pub struct ContainerClient {
    docker: Arc<Docker>,
    config: ContainerClientConfig,
}

impl std::fmt::Debug for ContainerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContainerClient {
    /// Create a new container client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if neither Docker nor Podman are reachable.
    pub async fn new() -> Result<Self> {
        Self::with_config(ContainerClientConfig::default()).await
    }

    /// Create a new container client with custom configuration.
    ///
    /// The first connection candidate that answers a ping wins.
    ///
    /// # Errors
    ///
    /// Returns error if the API version is malformed or no runtime answers.
    pub async fn with_config(config: ContainerClientConfig) -> Result<Self> {
        let version = parse_api_version(&config.api_version)?;

        for (label, candidate) in Self::candidates(&config, &version) {
            let docker = match candidate {
                Ok(docker) => docker,
                Err(e) => {
                    debug!("{} connection failed: {}", label, e);
                    continue;
                }
            };

            match docker.ping().await {
                Ok(_) => {
                    info!(
                        "Connected to container runtime via {} (API v{})",
                        label, config.api_version
                    );
                    return Ok(Self {
                        docker: Arc::new(docker),
                        config,
                    });
                }
                Err(e) => debug!("{} did not answer ping: {}", label, e),
            }
        }

        Err(ContainerError::ConnectionError(
            "Failed to connect to Docker or Podman. Please ensure Docker or Podman is installed and running.".to_string(),
        ))
    }

    /// Build connection candidates in priority order:
    /// 1. `DOCKER_HOST` environment variable (unix socket or tcp/http)
    /// 2. Local Docker socket
    /// 3. Rootless and system Podman sockets
    fn candidates(
        config: &ContainerClientConfig,
        version: &ClientVersion,
    ) -> Vec<(String, std::result::Result<Docker, bollard::errors::Error>)> {
        let mut candidates = Vec::new();

        if let Ok(host) = std::env::var("DOCKER_HOST")
            && !host.is_empty()
        {
            let docker = if host.starts_with("tcp://") || host.starts_with("http://") {
                Docker::connect_with_http(&host, config.timeout, version)
            } else {
                Docker::connect_with_socket(&host, config.timeout, version)
            };
            candidates.push((format!("DOCKER_HOST={host}"), docker));
        }

        #[cfg(unix)]
        {
            candidates.push((
                DEFAULT_DOCKER_SOCKET.to_string(),
                Docker::connect_with_socket(DEFAULT_DOCKER_SOCKET, config.timeout, version),
            ));

            if let Ok(home) = std::env::var("HOME") {
                let podman_socket = format!("unix://{home}/run/podman/podman.sock");
                let docker = Docker::connect_with_socket(&podman_socket, config.timeout, version);
                candidates.push((podman_socket, docker));
            }

            let system_socket = "unix:///run/podman/podman.sock";
            candidates.push((
                system_socket.to_string(),
                Docker::connect_with_socket(system_socket, config.timeout, version),
            ));
        }

        #[cfg(not(unix))]
        candidates.push((
            "local defaults".to_string(),
            Docker::connect_with_local_defaults(),
        ));

        candidates
    }

    /// Ping the container runtime to verify connectivity.
    ///
    /// # Errors
    ///
    /// Returns error if ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.docker.ping().await.map_err(|e| {
            ContainerError::ConnectionError(format!("Failed to ping container runtime: {}", e))
        })?;
        debug!("Container runtime ping successful");
        Ok(())
    }

    /// Get version information from the container runtime.
    ///
    /// # Errors
    ///
    /// Returns error if version query fails.
    pub async fn version(&self) -> Result<bollard::models::SystemVersion> {
        self.docker
            .version()
            .await
            .map_err(|e| ContainerError::Other(format!("Failed to get version: {}", e)))
    }

    /// Get the underlying Docker client.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    /// Check if the runtime is Docker or Podman.
    ///
    /// # Errors
    ///
    /// Returns error if runtime detection fails.
    pub async fn runtime_type(&self) -> Result<RuntimeType> {
        let version = self.version().await?;

        let is_podman = version
            .components
            .unwrap_or_default()
            .iter()
            .any(|c| c.name.to_lowercase().contains("podman"));

        if is_podman {
            Ok(RuntimeType::Podman)
        } else {
            Ok(RuntimeType::Docker)
        }
    }
}

/// Type of container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "Docker"),
            RuntimeType::Podman => write!(f, "Podman"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_version() {
        let version = parse_api_version("1.39").unwrap();
        assert_eq!(version.major_version, 1);
        assert_eq!(version.minor_version, 39);

        let version = parse_api_version(" 1.44 ").unwrap();
        assert_eq!(version.minor_version, 44);
    }

    #[test]
    fn test_parse_api_version_rejects_garbage() {
        assert!(parse_api_version("").is_err());
        assert!(parse_api_version("1").is_err());
        assert!(parse_api_version("v1.39").is_err());
        assert!(parse_api_version("1.x").is_err());
    }

    #[test]
    fn test_runtime_type_display() {
        assert_eq!(RuntimeType::Docker.to_string(), "Docker");
        assert_eq!(RuntimeType::Podman.to_string(), "Podman");
    }

    #[tokio::test]
    #[ignore] // Requires Docker/Podman to be running
    async fn test_client_connection() {
        let client = ContainerClient::new().await.unwrap();
        client.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_runtime_detection() {
        let client = ContainerClient::new().await.unwrap();
        let runtime_type = client.runtime_type().await.unwrap();
        println!("Runtime type: {}", runtime_type);
    }
}
