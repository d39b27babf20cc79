//! On-demand activation workflow.
//!
//! Walks the cluster's services in listing order, claims the first idle one
//! by scaling it to a single replica, waits for the new task to reach
//! `RUNNING`, then resolves its public address. Every way the walk can end is
//! a distinct [`ActivationOutcome`]; none of them is an error. Only platform
//! API failures propagate as [`BackendError`].

use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backend::ClusterBackend;
use crate::client::BackendError;
use crate::models::short_name;

/// Task status that ends the wait loop.
const RUNNING_STATUS: &str = "RUNNING";

/// Timings and addressing for one activation run.
#[derive(Debug, Clone)]
pub struct ActivationOptions {
    /// Delay between the scale-up and the first task listing.
    pub settle_delay: Duration,
    /// Delay between task status polls.
    pub poll_interval: Duration,
    /// Number of status polls before giving up on `RUNNING`.
    pub max_status_polls: u32,
    /// Port the activated service listens on, used to compose the result URL.
    pub service_port: u16,
}

/// Terminal state of an activation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// A service was scaled up, its task is running, and its address resolved.
    Started,
    /// Every service already had at least one task.
    AllBusy,
    /// The selected service was scaled up concurrently by another caller.
    Claimed,
    /// No task appeared after the scale-up and settle delay.
    NoTaskFound,
    /// The task never reported `RUNNING` within the poll budget.
    TimedOut,
    /// The task is running but carries no public address.
    NoPublicIp,
}

/// Result of one activation run.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    /// Reachable address of the activated service, when one came up.
    pub url: Option<String>,
    /// Whether every service was already occupied.
    pub all_in_use: bool,
    /// Terminal state of the run.
    pub outcome: ActivationOutcome,
    /// Short name of the service the run acted on, when one was selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Human-readable note for soft failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Activation {
    fn started(service: &str, url: String) -> Self {
        Self {
            url: Some(url),
            all_in_use: false,
            outcome: ActivationOutcome::Started,
            service: Some(service.to_string()),
            detail: None,
        }
    }

    fn all_busy() -> Self {
        Self {
            url: None,
            all_in_use: true,
            outcome: ActivationOutcome::AllBusy,
            service: None,
            detail: Some("all services are running, check back later".to_string()),
        }
    }

    fn soft_failure(outcome: ActivationOutcome, service: &str, detail: &str) -> Self {
        Self {
            url: None,
            all_in_use: false,
            outcome,
            service: Some(service.to_string()),
            detail: Some(detail.to_string()),
        }
    }
}

/// Find an idle service, scale it to one replica, and wait for its address.
///
/// At most one scale-up call is issued per invocation. The scale-up is
/// conditional on the service still being at zero desired replicas, so two
/// racing activations cannot both claim the same service.
///
/// # Errors
///
/// Returns an error only when a platform API call fails; every expected
/// "not ready" condition is an [`ActivationOutcome`] in the `Ok` result.
pub async fn activate(
    backend: &dyn ClusterBackend,
    cluster: &str,
    opts: &ActivationOptions,
) -> Result<Activation, BackendError> {
    let services = backend.list_services(cluster).await?;

    let mut selected = None;
    let mut last_busy_tasks = Vec::new();
    for service in services {
        let tasks = backend.list_tasks(cluster, &service).await?;
        if tasks.is_empty() {
            selected = Some(service);
            break;
        }
        last_busy_tasks = tasks;
    }

    let Some(service) = selected else {
        report_busy_cluster(backend, cluster, &last_busy_tasks).await;
        return Ok(Activation::all_busy());
    };
    let service_name = short_name(&service);

    info!(service = %service_name, "no tasks running, activating service");
    match backend
        .set_desired_count(cluster, &service, 1, Some(0))
        .await
    {
        Ok(_) => {}
        Err(BackendError::Conflict { .. }) => {
            info!(service = %service_name, "service was claimed concurrently");
            return Ok(Activation::soft_failure(
                ActivationOutcome::Claimed,
                service_name,
                "service was claimed by a concurrent activation",
            ));
        }
        Err(err) => return Err(err),
    }

    // Scaling -> Waiting: give the platform time to materialize the task.
    sleep(opts.settle_delay).await;
    let tasks = backend.list_tasks(cluster, &service).await?;
    let Some(task) = tasks.first() else {
        warn!(service = %service_name, "no task appeared after scale-up");
        return Ok(Activation::soft_failure(
            ActivationOutcome::NoTaskFound,
            service_name,
            "no new task found",
        ));
    };

    // Waiting -> Running | TimedOut.
    if !wait_until_running(backend, cluster, task, opts).await? {
        warn!(service = %service_name, task = %task, "task never reached RUNNING");
        return Ok(Activation::soft_failure(
            ActivationOutcome::TimedOut,
            service_name,
            "task did not reach RUNNING within the poll budget",
        ));
    }

    match backend.resolve_public_ip(cluster, task).await? {
        Some(ip) => {
            let url = format!("http://{ip}:{}", opts.service_port);
            info!(service = %service_name, %url, "service activated");
            Ok(Activation::started(service_name, url))
        }
        None => Ok(Activation::soft_failure(
            ActivationOutcome::NoPublicIp,
            service_name,
            "no public IP assigned to the task",
        )),
    }
}

/// Poll the task's status until it reports `RUNNING` or the budget runs out.
async fn wait_until_running(
    backend: &dyn ClusterBackend,
    cluster: &str,
    task: &str,
    opts: &ActivationOptions,
) -> Result<bool, BackendError> {
    let task_batch = [task.to_string()];
    for attempt in 1..=opts.max_status_polls {
        let details = backend.describe_tasks(cluster, &task_batch).await?;
        let status = details
            .first()
            .map_or("UNKNOWN", |detail| detail.last_status.as_str());
        if status == RUNNING_STATUS {
            return Ok(true);
        }
        debug!(%task, attempt, status, "task not running yet");
        if attempt < opts.max_status_polls {
            sleep(opts.poll_interval).await;
        }
    }
    Ok(false)
}

/// Log the last-checked service's task statuses when the whole cluster is
/// busy. Diagnostic only; lookup failures are swallowed.
async fn report_busy_cluster(backend: &dyn ClusterBackend, cluster: &str, tasks: &[String]) {
    if tasks.is_empty() {
        info!(%cluster, "all services are running");
        return;
    }
    match backend.describe_tasks(cluster, tasks).await {
        Ok(details) => {
            for detail in details {
                info!(task = %detail.task_arn, status = %detail.last_status, "all services busy");
            }
        }
        Err(err) => warn!(%cluster, error = %err, "could not describe tasks of busy cluster"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ServiceDescription, TaskDetail};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::sync::Mutex;

    /// In-memory backend: services with task lists, scripted status
    /// sequences, and recorded mutation calls.
    #[derive(Default)]
    struct FakeBackend {
        services: Vec<String>,
        tasks: Mutex<HashMap<String, Vec<String>>>,
        /// Status answers per task, consumed one per describe; the last entry
        /// repeats once the script runs out.
        statuses: Mutex<HashMap<String, Vec<String>>>,
        ips: HashMap<String, IpAddr>,
        /// Task id inserted into the service's task list on scale-up.
        spawn_on_scale: Option<String>,
        /// Service short name whose scale-up answers with a conflict.
        conflict_on: Option<String>,
        scale_calls: Mutex<Vec<(String, u32, Option<u32>)>>,
        describe_calls: Mutex<usize>,
    }

    impl FakeBackend {
        fn with_services(services: &[(&str, &[&str])]) -> Self {
            let mut backend = Self::default();
            for (service, tasks) in services {
                backend.services.push((*service).to_string());
                backend.tasks.lock().unwrap().insert(
                    (*service).to_string(),
                    tasks.iter().map(|t| (*t).to_string()).collect(),
                );
            }
            backend
        }

        fn script_status(&mut self, task: &str, statuses: &[&str]) {
            self.statuses.lock().unwrap().insert(
                task.to_string(),
                statuses.iter().map(|s| (*s).to_string()).collect(),
            );
        }

        fn scale_calls(&self) -> Vec<(String, u32, Option<u32>)> {
            self.scale_calls.lock().unwrap().clone()
        }

        fn describe_count(&self) -> usize {
            *self.describe_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ClusterBackend for FakeBackend {
        async fn list_services(&self, _cluster: &str) -> Result<Vec<String>, BackendError> {
            Ok(self.services.clone())
        }

        async fn list_tasks(
            &self,
            _cluster: &str,
            service: &str,
        ) -> Result<Vec<String>, BackendError> {
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .get(service)
                .cloned()
                .unwrap_or_default())
        }

        async fn describe_tasks(
            &self,
            _cluster: &str,
            tasks: &[String],
        ) -> Result<Vec<TaskDetail>, BackendError> {
            *self.describe_calls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            Ok(tasks
                .iter()
                .map(|task| {
                    let script = statuses.entry(task.clone()).or_default();
                    let status = if script.len() > 1 {
                        script.remove(0)
                    } else {
                        script.first().cloned().unwrap_or_else(|| "PENDING".to_string())
                    };
                    TaskDetail {
                        task_arn: task.clone(),
                        last_status: status,
                        attachments: Vec::new(),
                    }
                })
                .collect())
        }

        async fn set_desired_count(
            &self,
            _cluster: &str,
            service: &str,
            desired_count: u32,
            expected_count: Option<u32>,
        ) -> Result<ServiceDescription, BackendError> {
            self.scale_calls.lock().unwrap().push((
                service.to_string(),
                desired_count,
                expected_count,
            ));
            if self.conflict_on.as_deref() == Some(short_name(service)) {
                return Err(BackendError::Conflict {
                    service: short_name(service).to_string(),
                });
            }
            if let Some(task) = &self.spawn_on_scale {
                self.tasks
                    .lock()
                    .unwrap()
                    .entry(service.to_string())
                    .or_default()
                    .push(task.clone());
            }
            Ok(ServiceDescription {
                service_arn: service.to_string(),
                desired_count,
                running_count: 0,
            })
        }

        async fn resolve_public_ip(
            &self,
            _cluster: &str,
            task: &str,
        ) -> Result<Option<IpAddr>, BackendError> {
            Ok(self.ips.get(task).copied())
        }
    }

    fn instant_opts() -> ActivationOptions {
        ActivationOptions {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            max_status_polls: 10,
            service_port: 7860,
        }
    }

    #[tokio::test]
    async fn selects_first_idle_service_and_scales_once() {
        let mut backend = FakeBackend::with_services(&[
            ("c/a", &["t1"]),
            ("c/b", &[]),
            ("c/idle-too", &[]),
        ]);
        backend.spawn_on_scale = Some("t2".to_string());
        backend.script_status("t2", &["RUNNING"]);
        backend
            .ips
            .insert("t2".to_string(), "203.0.113.9".parse().unwrap());

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::Started);
        assert_eq!(result.service.as_deref(), Some("b"));
        assert_eq!(result.url.as_deref(), Some("http://203.0.113.9:7860"));
        assert!(!result.all_in_use);

        let calls = backend.scale_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("c/b".to_string(), 1, Some(0)));
    }

    #[tokio::test]
    async fn busy_cluster_issues_no_scale_calls() {
        let backend = FakeBackend::with_services(&[("c/a", &["t1"]), ("c/b", &["t2"])]);

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::AllBusy);
        assert!(result.all_in_use);
        assert!(result.url.is_none());
        assert!(backend.scale_calls().is_empty());
    }

    #[tokio::test]
    async fn waits_through_pending_statuses() {
        let mut backend = FakeBackend::with_services(&[("c/a", &["t1"]), ("c/b", &[])]);
        backend.spawn_on_scale = Some("t2".to_string());
        backend.script_status("t2", &["PROVISIONING", "PENDING", "RUNNING"]);
        backend
            .ips
            .insert("t2".to_string(), "198.51.100.7".parse().unwrap());

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::Started);
        assert_eq!(result.url.as_deref(), Some("http://198.51.100.7:7860"));
        assert_eq!(backend.describe_count(), 3);
    }

    #[tokio::test]
    async fn poll_budget_exhaustion_is_a_soft_timeout() {
        let mut backend = FakeBackend::with_services(&[("c/b", &[])]);
        backend.spawn_on_scale = Some("t2".to_string());
        backend.script_status("t2", &["PENDING"]);

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::TimedOut);
        assert!(result.url.is_none());
        assert!(!result.all_in_use);
        // One describe per poll, and none afterwards: address resolution is
        // not attempted for a task that never ran.
        assert_eq!(backend.describe_count(), 10);
    }

    #[tokio::test]
    async fn missing_task_after_scale_up() {
        let backend = FakeBackend::with_services(&[("c/b", &[])]);

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::NoTaskFound);
        assert_eq!(result.detail.as_deref(), Some("no new task found"));
    }

    #[tokio::test]
    async fn running_task_without_public_ip() {
        let mut backend = FakeBackend::with_services(&[("c/b", &[])]);
        backend.spawn_on_scale = Some("t2".to_string());
        backend.script_status("t2", &["RUNNING"]);

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::NoPublicIp);
        assert!(result.url.is_none());
    }

    #[tokio::test]
    async fn concurrent_claim_is_a_soft_outcome() {
        let mut backend = FakeBackend::with_services(&[("c/b", &[])]);
        backend.conflict_on = Some("b".to_string());

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::Claimed);
        assert!(result.url.is_none());
        assert!(!result.all_in_use);
    }

    #[tokio::test]
    async fn empty_cluster_reports_all_in_use() {
        let backend = FakeBackend::default();

        let result = activate(&backend, "c", &instant_opts()).await.unwrap();

        assert_eq!(result.outcome, ActivationOutcome::AllBusy);
        assert!(result.all_in_use);
    }
}
