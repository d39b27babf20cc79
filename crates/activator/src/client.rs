//! HTTP clients for the cluster-orchestration and virtual-network APIs.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    DescribeTasksRequest, DescribeTasksResponse, ListServicesResponse, ListTasksResponse,
    NetworkInterfaceResponse, ServiceDescription, TaskDetail, UpdateDesiredCountRequest,
    short_name,
};

/// Errors surfaced by the platform API clients.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("platform API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("unexpected platform API payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("desired-count precondition failed for service {service}")]
    Conflict { service: String },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

fn default_headers(api_token: Option<&str>) -> Result<HeaderMap, BackendError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("activator/", env!("CARGO_PKG_VERSION"))),
    );
    if let Some(token) = api_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            BackendError::Config("API token contains invalid header characters".to_string())
        })?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn build_http_client(
    api_token: Option<&str>,
    timeout_secs: u64,
) -> Result<reqwest::Client, BackendError> {
    Ok(reqwest::Client::builder()
        .default_headers(default_headers(api_token)?)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read a JSON body, mapping non-2xx answers to [`BackendError::Api`].
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// Client for the cluster-orchestration API.
///
/// Thin passthrough: no retries, no caching. Service and task state is owned
/// by the platform and always re-fetched.
#[derive(Debug, Clone)]
pub struct ClusterApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClusterApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        base_url: &str,
        api_token: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_http_client(api_token, timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List the ids of all services in a cluster.
    pub async fn list_services(&self, cluster: &str) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/v1/clusters/{cluster}/services", self.base_url);
        debug!(%cluster, "listing services");
        let response = self.client.get(&url).send().await?;
        let body: ListServicesResponse = read_json(response).await?;
        Ok(body.services)
    }

    /// List the ids of the tasks currently associated with a service.
    ///
    /// An idle service yields an empty list, not an error.
    pub async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<String>, BackendError> {
        let url = format!(
            "{}/v1/clusters/{cluster}/services/{}/tasks",
            self.base_url,
            short_name(service)
        );
        let response = self.client.get(&url).send().await?;
        let body: ListTasksResponse = read_json(response).await?;
        Ok(body.tasks)
    }

    /// Describe a batch of tasks.
    ///
    /// The platform rejects an empty describe batch, so an empty input
    /// short-circuits without a request.
    pub async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskDetail>, BackendError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/v1/clusters/{cluster}/tasks/describe", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&DescribeTasksRequest { tasks })
            .send()
            .await?;
        let body: DescribeTasksResponse = read_json(response).await?;
        Ok(body.tasks)
    }

    /// Change a service's desired replica count.
    ///
    /// With `expected_count` set, the platform applies the change only if the
    /// current desired count matches; a mismatch is reported as
    /// [`BackendError::Conflict`].
    pub async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
        expected_count: Option<u32>,
    ) -> Result<ServiceDescription, BackendError> {
        let service = short_name(service);
        let url = format!(
            "{}/v1/clusters/{cluster}/services/{service}/desired-count",
            self.base_url
        );
        debug!(%cluster, %service, desired_count, "updating desired count");
        let response = self
            .client
            .patch(&url)
            .json(&UpdateDesiredCountRequest {
                desired_count,
                expected_count,
            })
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(BackendError::Conflict {
                service: service.to_string(),
            });
        }
        read_json(response).await
    }
}

/// Client for the virtual-network API.
#[derive(Debug, Clone)]
pub struct NetworkApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl NetworkApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        base_url: &str,
        api_token: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_http_client(api_token, timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve the public IP associated with a network interface.
    ///
    /// An interface without a public association yields `None`.
    pub async fn interface_public_ip(
        &self,
        interface_id: &str,
    ) -> Result<Option<IpAddr>, BackendError> {
        let url = format!("{}/v1/network-interfaces/{interface_id}", self.base_url);
        let response = self.client.get(&url).send().await?;
        let body: NetworkInterfaceResponse = read_json(response).await?;

        let Some(public_ip) = body
            .network_interface
            .association
            .and_then(|association| association.public_ip)
        else {
            return Ok(None);
        };

        match public_ip.parse::<IpAddr>() {
            Ok(ip) => Ok(Some(ip)),
            Err(_) => {
                warn!(%interface_id, %public_ip, "platform reported an unparseable public IP");
                Ok(None)
            }
        }
    }
}
