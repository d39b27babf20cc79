//! Cluster-wide status aggregation for the `/get_status` endpoint.

use std::net::IpAddr;

use anyhow::Result;
use serde::Serialize;

use crate::backend::ClusterBackend;
use crate::client::BackendError;
use crate::models::short_name;

/// Status line for one service.
#[derive(Debug, Serialize)]
pub struct ServiceStatusEntry {
    pub service: String,
    pub status: ServiceStatus,
}

/// Either a fixed idle marker or one entry per task.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ServiceStatus {
    Idle(&'static str),
    Tasks(Vec<TaskStatusEntry>),
}

/// Status of one task, with its resolved public address when it has one.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusEntry {
    pub task_arn: String,
    pub last_status: String,
    /// `null` when the task has no resolvable public address.
    pub ip_address: Option<IpAddr>,
}

/// Marker reported for a service with no running tasks.
pub const IDLE_STATUS: &str = "no task running";

/// Collect the status of every service in the cluster.
///
/// # Errors
///
/// Returns an error if any platform API call fails; partial aggregation is
/// not reported.
pub async fn collect_status(
    backend: &dyn ClusterBackend,
    cluster: &str,
) -> Result<Vec<ServiceStatusEntry>> {
    let services = backend.list_services(cluster).await?;
    let mut entries = Vec::with_capacity(services.len());

    for service in services {
        let tasks = backend.list_tasks(cluster, &service).await?;
        if tasks.is_empty() {
            entries.push(ServiceStatusEntry {
                service: short_name(&service).to_string(),
                status: ServiceStatus::Idle(IDLE_STATUS),
            });
            continue;
        }

        let details = backend.describe_tasks(cluster, &tasks).await?;
        let mut task_entries = Vec::with_capacity(details.len());
        for detail in details {
            let ip_address = backend.resolve_public_ip(cluster, &detail.task_arn).await?;
            task_entries.push(TaskStatusEntry {
                task_arn: detail.task_arn,
                last_status: detail.last_status,
                ip_address,
            });
        }
        entries.push(ServiceStatusEntry {
            service: short_name(&service).to_string(),
            status: ServiceStatus::Tasks(task_entries),
        });
    }

    Ok(entries)
}

/// Failure buckets for status aggregation, used to pick the log line and the
/// generic client-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFailure {
    /// The platform API was unreachable or answered with an error.
    Backend,
    /// An answer could not be interpreted.
    Value,
    /// Anything else.
    Unclassified,
}

impl StatusFailure {
    /// Generic message surfaced to the client; the underlying error stays in
    /// the logs.
    #[must_use]
    pub fn public_message(self) -> &'static str {
        match self {
            Self::Backend => "A platform API error occurred.",
            Self::Value => "A value error occurred.",
            Self::Unclassified => "An unexpected error occurred.",
        }
    }
}

/// Classify an aggregation failure.
#[must_use]
pub fn classify_failure(err: &anyhow::Error) -> StatusFailure {
    match err.downcast_ref::<BackendError>() {
        Some(BackendError::Payload(_)) => StatusFailure::Value,
        Some(_) => StatusFailure::Backend,
        None => StatusFailure::Unclassified,
    }
}
