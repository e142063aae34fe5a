//! Instance filter expressions for filtered container-instance listings.
//!
//! The scheduler accepts a small query language over agent version,
//! machine type, and running-task count. `InstanceFilter` is the typed
//! form; `Display` renders the query string sent to the control plane.

use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::types::ContainerInstance;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceFilter {
    /// Agent version strictly older than the threshold.
    AgentVersionBelow(Version),
    /// Machine type equal to the given type.
    MachineType(String),
    /// At most N running tasks.
    RunningTasksAtMost(u32),
}

impl InstanceFilter {
    /// Evaluate the filter against a single instance.
    ///
    /// Instances whose agent version is not valid semver never match
    /// an agent-version filter.
    pub fn matches(&self, instance: &ContainerInstance) -> bool {
        match self {
            InstanceFilter::AgentVersionBelow(threshold) => {
                match Version::parse(instance.agent_version.trim()) {
                    Ok(v) => v < *threshold,
                    Err(_) => false,
                }
            }
            InstanceFilter::MachineType(t) => instance.machine_type == *t,
            InstanceFilter::RunningTasksAtMost(n) => instance.running_tasks <= *n,
        }
    }
}

impl fmt::Display for InstanceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceFilter::AgentVersionBelow(v) => write!(f, "agentVersion < {v}"),
            InstanceFilter::MachineType(t) => write!(f, "attribute:ecs.instance-type == {t}"),
            InstanceFilter::RunningTasksAtMost(n) => write!(f, "runningTasksCount <= {n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstanceStatus;

    fn instance(agent: &str, machine_type: &str, tasks: u32) -> ContainerInstance {
        ContainerInstance {
            arn: "arn:ci/1".to_string(),
            machine_id: "i-1".to_string(),
            machine_type: machine_type.to_string(),
            agent_version: agent.to_string(),
            running_tasks: tasks,
            status: InstanceStatus::Active,
            launched_at: None,
        }
    }

    #[test]
    fn renders_query_strings() {
        let f = InstanceFilter::AgentVersionBelow(Version::new(1, 39, 0));
        assert_eq!(f.to_string(), "agentVersion < 1.39.0");

        let f = InstanceFilter::MachineType("m5.large".to_string());
        assert_eq!(f.to_string(), "attribute:ecs.instance-type == m5.large");

        let f = InstanceFilter::RunningTasksAtMost(1);
        assert_eq!(f.to_string(), "runningTasksCount <= 1");
    }

    #[test]
    fn agent_version_compares_semantically() {
        let f = InstanceFilter::AgentVersionBelow(Version::new(1, 39, 0));
        // Lexicographic comparison would put "1.9.0" after "1.39.0".
        assert!(f.matches(&instance("1.9.0", "m5.large", 0)));
        assert!(f.matches(&instance("1.38.2", "m5.large", 0)));
        assert!(!f.matches(&instance("1.39.0", "m5.large", 0)));
        assert!(!f.matches(&instance("1.40.1", "m5.large", 0)));
    }

    #[test]
    fn unparsable_agent_version_never_matches() {
        let f = InstanceFilter::AgentVersionBelow(Version::new(9, 0, 0));
        assert!(!f.matches(&instance("unknown", "m5.large", 0)));
    }

    #[test]
    fn machine_type_and_task_count() {
        let ci = instance("1.40.0", "c5.xlarge", 2);
        assert!(InstanceFilter::MachineType("c5.xlarge".into()).matches(&ci));
        assert!(!InstanceFilter::MachineType("m5.large".into()).matches(&ci));
        assert!(InstanceFilter::RunningTasksAtMost(2).matches(&ci));
        assert!(!InstanceFilter::RunningTasksAtMost(1).matches(&ci));
    }
}
