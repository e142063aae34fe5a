//! MemoryPlane — an in-memory simulated fleet.
//!
//! Holds one cluster, one service, one instance group, and the container
//! instances registered with the cluster. Behaves like the real control
//! plane where the scale-down core can observe it: listings paginate,
//! describe calls enforce their identifier limits, capacity updates are
//! validated, and terminated machines leave the inventory. Every mutating
//! call is appended to a journal that tests inspect.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use fleetdown_core::{
    ClusterSummary, ContainerInstance, GroupCapacity, InstanceFilter, InstanceIdentity,
    InstanceStatus, MachineLaunch, Page, ServiceSummary,
};

use crate::error::{PlaneError, PlaneResult};
use crate::plane::{ControlPlane, DESCRIBE_INSTANCES_LIMIT, DESCRIBE_MACHINES_LIMIT};

/// Serializable state of a simulated fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub cluster: String,
    /// Active service count reported for the cluster.
    #[serde(default)]
    pub active_services: Option<u32>,
    pub service: String,
    pub service_desired: u32,
    pub group: GroupRecord,
    pub instances: Vec<ContainerInstance>,
    /// Items per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Machines terminated so far.
    #[serde(default)]
    pub terminated: Vec<String>,
}

fn default_page_size() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

/// A mutating call observed by the plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaneEvent {
    Drained { arns: Vec<String> },
    ServiceDesired(u32),
    GroupCapacity { min: u32, desired: u32, max: Option<u32> },
    Terminated { machine_id: String, decrement_desired: bool },
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneOp {
    DescribeCluster,
    DescribeService,
    UpdateService,
    ServiceStable,
    ListInstances,
    DescribeInstances,
    DescribeMachines,
    UpdateInstanceState,
    TerminateInstance,
    MachinesTerminated,
    UpdateGroup,
    GroupInService,
    DescribeGroup,
}

impl PlaneOp {
    pub fn name(&self) -> &'static str {
        match self {
            PlaneOp::DescribeCluster => "DescribeClusters",
            PlaneOp::DescribeService => "DescribeServices",
            PlaneOp::UpdateService => "UpdateService",
            PlaneOp::ServiceStable => "ServicesStable",
            PlaneOp::ListInstances => "ListContainerInstances",
            PlaneOp::DescribeInstances => "DescribeContainerInstances",
            PlaneOp::DescribeMachines => "DescribeInstances",
            PlaneOp::UpdateInstanceState => "UpdateContainerInstancesState",
            PlaneOp::TerminateInstance => "TerminateInstanceInAutoScalingGroup",
            PlaneOp::MachinesTerminated => "InstanceTerminated",
            PlaneOp::UpdateGroup => "UpdateAutoScalingGroup",
            PlaneOp::GroupInService => "GroupInService",
            PlaneOp::DescribeGroup => "DescribeAutoScalingGroups",
        }
    }
}

struct FleetState {
    snap: FleetSnapshot,
    journal: Vec<PlaneEvent>,
    failures: HashMap<PlaneOp, String>,
    /// Unsuccessful probes each wait sees before converging.
    settle_probes: u32,
    probes: HashMap<PlaneOp, u32>,
}

impl FleetState {
    fn check(&self, op: PlaneOp) -> PlaneResult<()> {
        match self.failures.get(&op) {
            Some(message) => Err(PlaneError::Request {
                operation: op.name(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn probe(&mut self, op: PlaneOp) -> bool {
        let seen = self.probes.entry(op).or_insert(0);
        if *seen >= self.settle_probes {
            *seen = 0;
            true
        } else {
            *seen += 1;
            false
        }
    }

    fn expect_cluster(&self, cluster: &str) -> PlaneResult<()> {
        if self.snap.cluster == cluster {
            Ok(())
        } else {
            Err(PlaneError::not_found("cluster", cluster))
        }
    }

    fn expect_group(&self, group: &str) -> PlaneResult<()> {
        if self.snap.group.name == group {
            Ok(())
        } else {
            Err(PlaneError::not_found("instance group", group))
        }
    }

    fn page<T: Clone>(&self, items: &[T], next_token: Option<String>) -> PlaneResult<Page<T>> {
        let start = match next_token {
            Some(token) => token.parse::<usize>().map_err(|_| PlaneError::Rejected {
                operation: "paginate",
                reason: format!("invalid next token {token:?}"),
            })?,
            None => 0,
        };
        let size = self.snap.page_size.max(1);
        let end = (start + size).min(items.len());
        let slice = items.get(start..end).unwrap_or_default().to_vec();
        Ok(Page {
            items: slice,
            next_token: (end < items.len()).then(|| end.to_string()),
        })
    }
}

/// Thread-safe simulated control plane. Clones share the same fleet.
#[derive(Clone)]
pub struct MemoryPlane {
    inner: Arc<Mutex<FleetState>>,
}

impl MemoryPlane {
    pub fn from_snapshot(snap: FleetSnapshot) -> Self {
        debug!(
            cluster = %snap.cluster,
            instances = snap.instances.len(),
            "in-memory fleet loaded"
        );
        Self {
            inner: Arc::new(Mutex::new(FleetState {
                snap,
                journal: Vec::new(),
                failures: HashMap::new(),
                settle_probes: 0,
                probes: HashMap::new(),
            })),
        }
    }

    /// Load a fleet snapshot from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snap: FleetSnapshot = serde_json::from_str(&content)?;
        Ok(Self::from_snapshot(snap))
    }

    /// Write the current fleet state to a JSON file.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snap = self.snapshot().await;
        std::fs::write(path, serde_json::to_string_pretty(&snap)?)?;
        Ok(())
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        self.inner.lock().await.snap.clone()
    }

    /// Mutating calls seen so far, in order.
    pub async fn journal(&self) -> Vec<PlaneEvent> {
        self.inner.lock().await.journal.clone()
    }

    /// Make every subsequent call of `op` fail with `message`.
    pub async fn fail(&self, op: PlaneOp, message: &str) {
        self.inner
            .lock()
            .await
            .failures
            .insert(op, message.to_string());
    }

    /// Number of unsuccessful probes each wait observes before converging.
    pub async fn set_settle_probes(&self, probes: u32) {
        self.inner.lock().await.settle_probes = probes;
    }

    /// Change the reported active-service count.
    pub async fn set_active_services(&self, count: Option<u32>) {
        self.inner.lock().await.snap.active_services = count;
    }
}

#[async_trait]
impl ControlPlane for MemoryPlane {
    async fn describe_cluster(&self, cluster: &str) -> PlaneResult<ClusterSummary> {
        let state = self.inner.lock().await;
        state.check(PlaneOp::DescribeCluster)?;
        state.expect_cluster(cluster)?;
        Ok(ClusterSummary {
            name: state.snap.cluster.clone(),
            active_services: state.snap.active_services,
        })
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> PlaneResult<ServiceSummary> {
        let state = self.inner.lock().await;
        state.check(PlaneOp::DescribeService)?;
        state.expect_cluster(cluster)?;
        if state.snap.service != service {
            return Err(PlaneError::not_found("service", service));
        }
        Ok(ServiceSummary {
            name: state.snap.service.clone(),
            desired_count: state.snap.service_desired,
        })
    }

    async fn update_service_desired_count(
        &self,
        cluster: &str,
        service: &str,
        count: u32,
    ) -> PlaneResult<ServiceSummary> {
        let mut state = self.inner.lock().await;
        state.check(PlaneOp::UpdateService)?;
        state.expect_cluster(cluster)?;
        if state.snap.service != service {
            return Err(PlaneError::not_found("service", service));
        }
        state.snap.service_desired = count;
        state.journal.push(PlaneEvent::ServiceDesired(count));
        Ok(ServiceSummary {
            name: service.to_string(),
            desired_count: count,
        })
    }

    async fn service_stable(&self, cluster: &str, _service: &str) -> PlaneResult<bool> {
        let mut state = self.inner.lock().await;
        state.check(PlaneOp::ServiceStable)?;
        state.expect_cluster(cluster)?;
        Ok(state.probe(PlaneOp::ServiceStable))
    }

    async fn list_instances(
        &self,
        cluster: &str,
        filter: Option<&InstanceFilter>,
        next_token: Option<String>,
    ) -> PlaneResult<Page<String>> {
        let state = self.inner.lock().await;
        state.check(PlaneOp::ListInstances)?;
        state.expect_cluster(cluster)?;
        let arns: Vec<String> = state
            .snap
            .instances
            .iter()
            .filter(|ci| filter.is_none_or(|f| f.matches(ci)))
            .map(|ci| ci.arn.clone())
            .collect();
        state.page(&arns, next_token)
    }

    async fn describe_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> PlaneResult<Vec<InstanceIdentity>> {
        let state = self.inner.lock().await;
        state.check(PlaneOp::DescribeInstances)?;
        state.expect_cluster(cluster)?;
        if arns.len() > DESCRIBE_INSTANCES_LIMIT {
            return Err(PlaneError::BatchTooLarge {
                operation: PlaneOp::DescribeInstances.name(),
                limit: DESCRIBE_INSTANCES_LIMIT,
                requested: arns.len(),
            });
        }
        Ok(arns
            .iter()
            .filter_map(|arn| state.snap.instances.iter().find(|ci| ci.arn == *arn))
            .map(|ci| InstanceIdentity {
                arn: ci.arn.clone(),
                machine_id: ci.machine_id.clone(),
            })
            .collect())
    }

    async fn describe_machines(
        &self,
        machine_ids: &[String],
        next_token: Option<String>,
    ) -> PlaneResult<Page<MachineLaunch>> {
        let state = self.inner.lock().await;
        state.check(PlaneOp::DescribeMachines)?;
        if machine_ids.len() > DESCRIBE_MACHINES_LIMIT {
            return Err(PlaneError::BatchTooLarge {
                operation: PlaneOp::DescribeMachines.name(),
                limit: DESCRIBE_MACHINES_LIMIT,
                requested: machine_ids.len(),
            });
        }
        let launches: Vec<MachineLaunch> = machine_ids
            .iter()
            .filter_map(|id| state.snap.instances.iter().find(|ci| ci.machine_id == *id))
            .filter_map(|ci| {
                ci.launched_at.map(|launched_at| MachineLaunch {
                    machine_id: ci.machine_id.clone(),
                    launched_at,
                })
            })
            .collect();
        state.page(&launches, next_token)
    }

    async fn update_instance_state(
        &self,
        cluster: &str,
        arns: &[String],
        status: InstanceStatus,
    ) -> PlaneResult<Vec<InstanceIdentity>> {
        let mut state = self.inner.lock().await;
        state.check(PlaneOp::UpdateInstanceState)?;
        state.expect_cluster(cluster)?;

        let mut confirmed = Vec::with_capacity(arns.len());
        for arn in arns {
            match state.snap.instances.iter_mut().find(|ci| ci.arn == *arn) {
                Some(ci) => {
                    ci.status = status;
                    confirmed.push(InstanceIdentity {
                        arn: ci.arn.clone(),
                        machine_id: ci.machine_id.clone(),
                    });
                }
                None => warn!(%arn, status = status.as_str(), "state change failed: unknown instance"),
            }
        }
        state.journal.push(PlaneEvent::Drained {
            arns: confirmed.iter().map(|c| c.arn.clone()).collect(),
        });
        Ok(confirmed)
    }

    async fn terminate_instance(
        &self,
        group: &str,
        machine_id: &str,
        decrement_desired: bool,
    ) -> PlaneResult<()> {
        let mut state = self.inner.lock().await;
        state.check(PlaneOp::TerminateInstance)?;
        state.expect_group(group)?;

        let Some(pos) = state
            .snap
            .instances
            .iter()
            .position(|ci| ci.machine_id == machine_id)
        else {
            return Err(PlaneError::not_found("machine", machine_id));
        };
        state.snap.instances.remove(pos);
        state.snap.terminated.push(machine_id.to_string());

        if decrement_desired {
            let g = &mut state.snap.group;
            g.desired = g.desired.saturating_sub(1);
            g.min = g.min.min(g.desired);
        }
        state.journal.push(PlaneEvent::Terminated {
            machine_id: machine_id.to_string(),
            decrement_desired,
        });
        Ok(())
    }

    async fn machines_terminated(&self, machine_ids: &[String]) -> PlaneResult<bool> {
        let mut state = self.inner.lock().await;
        state.check(PlaneOp::MachinesTerminated)?;
        let all_gone = machine_ids
            .iter()
            .all(|id| state.snap.terminated.contains(id));
        Ok(all_gone && state.probe(PlaneOp::MachinesTerminated))
    }

    async fn update_group_capacity(
        &self,
        group: &str,
        min: u32,
        desired: u32,
        max: Option<u32>,
    ) -> PlaneResult<()> {
        let mut state = self.inner.lock().await;
        state.check(PlaneOp::UpdateGroup)?;
        state.expect_group(group)?;

        let effective_max = max.unwrap_or(state.snap.group.max);
        if min > desired || desired > effective_max {
            return Err(PlaneError::Rejected {
                operation: PlaneOp::UpdateGroup.name(),
                reason: format!(
                    "capacity must satisfy min <= desired <= max (min={min}, desired={desired}, max={effective_max})"
                ),
            });
        }

        let g = &mut state.snap.group;
        g.min = min;
        g.desired = desired;
        g.max = effective_max;
        state.journal.push(PlaneEvent::GroupCapacity { min, desired, max });
        Ok(())
    }

    async fn group_in_service(&self, group: &str) -> PlaneResult<bool> {
        let mut state = self.inner.lock().await;
        state.check(PlaneOp::GroupInService)?;
        state.expect_group(group)?;
        Ok(state.probe(PlaneOp::GroupInService))
    }

    async fn describe_group(&self, group: &str) -> PlaneResult<GroupCapacity> {
        let state = self.inner.lock().await;
        state.check(PlaneOp::DescribeGroup)?;
        state.expect_group(group)?;
        let g = &state.snap.group;
        Ok(GroupCapacity {
            min: g.min,
            desired: g.desired,
            max: g.max,
        })
    }
}
