//! Shared types used across fleetdown crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registration state of a container instance in the task scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Eligible to receive new tasks.
    Active,
    /// No new tasks are placed; running tasks are rescheduled elsewhere.
    Draining,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Active => "ACTIVE",
            InstanceStatus::Draining => "DRAINING",
        }
    }
}

/// A worker node registered with the task scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInstance {
    /// Scheduler-side identifier (container instance ARN).
    pub arn: String,
    /// Identifier of the underlying virtual machine.
    pub machine_id: String,
    /// Machine type, e.g. `m5.large`.
    pub machine_type: String,
    /// Version of the scheduler agent running on the node.
    pub agent_version: String,
    /// Number of tasks currently running on the node.
    pub running_tasks: u32,
    #[serde(default = "default_status")]
    pub status: InstanceStatus,
    /// Machine launch time. `None` when the inventory has no record of it.
    #[serde(default)]
    pub launched_at: Option<DateTime<Utc>>,
}

fn default_status() -> InstanceStatus {
    InstanceStatus::Active
}

/// Pairing of a container instance with the machine that hosts it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub arn: String,
    pub machine_id: String,
}

/// Launch timestamp of a machine, as reported by the machine inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineLaunch {
    pub machine_id: String,
    pub launched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub name: String,
    /// Number of active services. Missing when the scheduler did not report it.
    pub active_services: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub name: String,
    pub desired_count: u32,
}

/// Capacity bounds of an autoscaled instance group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCapacity {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_defaults_to_active_without_launch_time() {
        let json = r#"{
            "arn": "arn:ci/1",
            "machine_id": "i-1",
            "machine_type": "m5.large",
            "agent_version": "1.40.0",
            "running_tasks": 2
        }"#;
        let ci: ContainerInstance = serde_json::from_str(json).unwrap();
        assert_eq!(ci.status, InstanceStatus::Active);
        assert!(ci.launched_at.is_none());
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&InstanceStatus::Draining).unwrap();
        assert_eq!(json, "\"DRAINING\"");
        assert_eq!(InstanceStatus::Draining.as_str(), "DRAINING");
    }

    #[test]
    fn last_page_has_no_token() {
        let page = Page {
            items: vec![1, 2, 3],
            next_token: None,
        };
        assert!(page.is_last());

        let page = Page {
            items: vec![1],
            next_token: Some("2".to_string()),
        };
        assert!(!page.is_last());
    }
}
