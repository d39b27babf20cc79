//! Read/mutate facade over the platform APIs.
//!
//! The activation workflow and the HTTP handlers depend on the
//! [`ClusterBackend`] trait rather than the concrete clients, so tests can
//! substitute an in-memory fake.

use std::net::IpAddr;

use async_trait::async_trait;

use crate::client::{BackendError, ClusterApiClient, NetworkApiClient};
use crate::config::Config;
use crate::models::{ServiceDescription, TaskDetail};

/// Access to the cluster-orchestration and virtual-network APIs.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// List the ids of all services in a cluster.
    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, BackendError>;

    /// List the ids of the tasks currently associated with a service.
    async fn list_tasks(&self, cluster: &str, service: &str)
        -> Result<Vec<String>, BackendError>;

    /// Describe a batch of tasks. Empty input yields an empty result without
    /// touching the platform.
    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskDetail>, BackendError>;

    /// Change a service's desired replica count, optionally conditional on
    /// the current value.
    async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
        expected_count: Option<u32>,
    ) -> Result<ServiceDescription, BackendError>;

    /// Resolve a task's public IP via its attached network interface.
    ///
    /// `None` at any step (no interface attached, no public association) is
    /// an answer, not an error.
    async fn resolve_public_ip(
        &self,
        cluster: &str,
        task: &str,
    ) -> Result<Option<IpAddr>, BackendError>;
}

/// [`ClusterBackend`] backed by the live platform APIs.
#[derive(Debug, Clone)]
pub struct PlatformBackend {
    cluster_api: ClusterApiClient,
    network_api: NetworkApiClient,
}

impl PlatformBackend {
    /// Build a backend from the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let token = config.api_token.as_deref();
        Ok(Self {
            cluster_api: ClusterApiClient::new(
                &config.orchestrator_url,
                token,
                config.request_timeout_secs,
            )?,
            network_api: NetworkApiClient::new(
                &config.network_url,
                token,
                config.request_timeout_secs,
            )?,
        })
    }

    /// Build a backend from already-constructed clients.
    #[must_use]
    pub fn from_parts(cluster_api: ClusterApiClient, network_api: NetworkApiClient) -> Self {
        Self {
            cluster_api,
            network_api,
        }
    }
}

#[async_trait]
impl ClusterBackend for PlatformBackend {
    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, BackendError> {
        self.cluster_api.list_services(cluster).await
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<String>, BackendError> {
        self.cluster_api.list_tasks(cluster, service).await
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskDetail>, BackendError> {
        self.cluster_api.describe_tasks(cluster, tasks).await
    }

    async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
        expected_count: Option<u32>,
    ) -> Result<ServiceDescription, BackendError> {
        self.cluster_api
            .set_desired_count(cluster, service, desired_count, expected_count)
            .await
    }

    async fn resolve_public_ip(
        &self,
        cluster: &str,
        task: &str,
    ) -> Result<Option<IpAddr>, BackendError> {
        let tasks = [task.to_string()];
        let details = self.cluster_api.describe_tasks(cluster, &tasks).await?;
        let Some(interface_id) = details
            .first()
            .and_then(TaskDetail::network_interface_id)
        else {
            return Ok(None);
        };
        self.network_api.interface_public_ip(interface_id).await
    }
}
