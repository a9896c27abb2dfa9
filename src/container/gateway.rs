//! Runtime gateway: the two runtime operations remediation depends on.

use crate::container::{ContainerClient, ContainerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A running container whose health check currently fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnhealthyContainer {
    /// Runtime-assigned identifier
    pub id: String,
    /// Names as reported by the runtime (usually `/`-prefixed)
    pub names: Vec<String>,
    /// Human readable status, e.g. `Up 3 minutes (unhealthy)`
    pub status: String,
}

impl UnhealthyContainer {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            names: vec![name.into()],
            status: status.into(),
        }
    }

    /// First runtime name without its leading `/`, or the short id when the
    /// runtime reported no name.
    pub fn display_name(&self) -> String {
        self.names
            .iter()
            .map(|name| name.trim_start_matches('/'))
            .find(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.chars().take(12).collect())
    }
}

/// Operations the remediation engine needs from a container runtime.
///
/// Both calls may be slow or fail; callers bound them with their own deadline.
#[async_trait]
pub trait RuntimeGateway: Send + Sync {
    /// List containers matching `health=unhealthy` and `status=running`.
    async fn list_unhealthy(&self) -> Result<Vec<UnhealthyContainer>>;

    /// Restart a container by identifier with default stop options.
    async fn restart(&self, container_id: &str) -> Result<()>;
}

/// [`RuntimeGateway`] backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerGateway {
    client: ContainerClient,
    label_filter: Option<String>,
}

impl DockerGateway {
    /// Create a gateway. `label_filter` (e.g. `autoheal=true`) further
    /// restricts the unhealthy listing when set.
    pub fn new(client: ContainerClient, label_filter: Option<String>) -> Self {
        Self {
            client,
            label_filter,
        }
    }

    /// Filters sent with every listing request.
    fn filters(&self) -> HashMap<String, Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("health".to_string(), vec!["unhealthy".to_string()]);
        filters.insert("status".to_string(), vec!["running".to_string()]);
        if let Some(label) = &self.label_filter {
            filters.insert("label".to_string(), vec![label.clone()]);
        }
        filters
    }
}

#[async_trait]
impl RuntimeGateway for DockerGateway {
    async fn list_unhealthy(&self) -> Result<Vec<UnhealthyContainer>> {
        let containers = self
            .client
            .docker()
            .list_containers(Some(bollard::container::ListContainersOptions::<String> {
                all: true,
                filters: self.filters(),
                ..Default::default()
            }))
            .await?;

        debug!("Runtime reported {} unhealthy containers", containers.len());

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                Some(UnhealthyContainer {
                    id: c.id?,
                    names: c.names.unwrap_or_default(),
                    status: c.status.unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn restart(&self, container_id: &str) -> Result<()> {
        debug!("Restarting container: {}", container_id);

        self.client
            .docker()
            .restart_container(
                container_id,
                None::<bollard::query_parameters::RestartContainerOptions>,
            )
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => ContainerError::NotFound(container_id.to_string()),
                e => ContainerError::ApiError(e),
            })?;

        info!("Restarted container: {}", container_id);
        Ok(())
    }
}
