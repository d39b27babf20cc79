//! Wire types for the cluster-orchestration and virtual-network APIs.

use serde::{Deserialize, Serialize};

/// Extract the short name from a path-style resource id.
///
/// The platform identifies services and tasks with path-style ids such as
/// `inference-pool/worker-a`; mutation endpoints address resources by the
/// final segment only.
#[must_use]
pub fn short_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Response to a service listing request.
#[derive(Debug, Deserialize)]
pub struct ListServicesResponse {
    pub services: Vec<String>,
}

/// Response to a task listing request.
#[derive(Debug, Deserialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<String>,
}

/// Request body for a batched task description.
#[derive(Debug, Serialize)]
pub struct DescribeTasksRequest<'a> {
    pub tasks: &'a [String],
}

/// Response to a batched task description.
#[derive(Debug, Deserialize)]
pub struct DescribeTasksResponse {
    pub tasks: Vec<TaskDetail>,
}

/// Description of one task instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub task_arn: String,
    /// Lifecycle status as reported by the platform (`PENDING`, `RUNNING`,
    /// `STOPPED`, ...). Externally driven; never interpreted beyond equality.
    pub last_status: String,
    #[serde(default)]
    pub attachments: Vec<TaskAttachment>,
}

impl TaskDetail {
    /// Id of the network interface attached to this task, if any.
    #[must_use]
    pub fn network_interface_id(&self) -> Option<&str> {
        self.attachments
            .iter()
            .filter(|attachment| attachment.kind == "NetworkInterface")
            .flat_map(|attachment| &attachment.details)
            .find(|detail| detail.name == "networkInterfaceId")
            .map(|detail| detail.value.as_str())
    }
}

/// A network resource attached to a task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskAttachment {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub details: Vec<AttachmentDetail>,
}

/// One key/value entry in an attachment's detail list.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentDetail {
    pub name: String,
    pub value: String,
}

/// Request body for a desired-count change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDesiredCountRequest {
    pub desired_count: u32,
    /// When set, the platform applies the change only if the current desired
    /// count matches, answering 409 otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_count: Option<u32>,
}

/// Description of a service, as returned by scale mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_arn: String,
    pub desired_count: u32,
    #[serde(default)]
    pub running_count: u32,
}

/// Response to a network-interface lookup.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceResponse {
    pub network_interface: NetworkInterface,
}

/// A network interface and its optional public association.
#[derive(Debug, Deserialize)]
pub struct NetworkInterface {
    #[serde(default)]
    pub association: Option<InterfaceAssociation>,
}

/// Public addressing association of a network interface.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceAssociation {
    #[serde(default)]
    pub public_ip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("inference-pool/worker-a"), "worker-a");
        assert_eq!(short_name("worker-a"), "worker-a");
        assert_eq!(short_name("a/b/c"), "c");
    }

    #[test]
    fn test_task_detail_network_interface_id() {
        let detail: TaskDetail = serde_json::from_value(json!({
            "taskArn": "inference-pool/tasks/t1",
            "lastStatus": "RUNNING",
            "attachments": [
                {
                    "type": "ServiceConnect",
                    "details": [{"name": "discoveryName", "value": "worker-a"}]
                },
                {
                    "type": "NetworkInterface",
                    "details": [
                        {"name": "subnetId", "value": "subnet-9"},
                        {"name": "networkInterfaceId", "value": "eni-42"}
                    ]
                }
            ]
        }))
        .expect("task detail should parse");

        assert_eq!(detail.network_interface_id(), Some("eni-42"));
    }

    #[test]
    fn test_task_detail_without_interface() {
        let no_attachments: TaskDetail = serde_json::from_value(json!({
            "taskArn": "t1",
            "lastStatus": "PENDING"
        }))
        .expect("task detail should parse");
        assert_eq!(no_attachments.network_interface_id(), None);

        let wrong_kind: TaskDetail = serde_json::from_value(json!({
            "taskArn": "t1",
            "lastStatus": "RUNNING",
            "attachments": [
                {"type": "ServiceConnect", "details": [{"name": "networkInterfaceId", "value": "eni-1"}]}
            ]
        }))
        .expect("task detail should parse");
        assert_eq!(wrong_kind.network_interface_id(), None);
    }
}
