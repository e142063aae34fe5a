//! The `ControlPlane` trait — abstract operations over the task scheduler,
//! the autoscaled instance group, and the machine inventory.

use async_trait::async_trait;

use fleetdown_core::{
    ClusterSummary, GroupCapacity, InstanceFilter, InstanceIdentity, InstanceStatus,
    MachineLaunch, Page, ServiceSummary,
};

use crate::error::PlaneResult;

/// Maximum container-instance identifiers per `describe_instances` call.
pub const DESCRIBE_INSTANCES_LIMIT: usize = 100;

/// Maximum machine identifiers per `describe_machines` call.
pub const DESCRIBE_MACHINES_LIMIT: usize = 200;

/// Primitives consumed by the selector and the orchestrator.
///
/// Every method is a single request. Convergence is expressed as boolean
/// probes (`service_stable`, `group_in_service`, `machines_terminated`);
/// the polling loop lives in [`crate::wait::poll_until`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn describe_cluster(&self, cluster: &str) -> PlaneResult<ClusterSummary>;

    async fn describe_service(&self, cluster: &str, service: &str)
    -> PlaneResult<ServiceSummary>;

    async fn update_service_desired_count(
        &self,
        cluster: &str,
        service: &str,
        count: u32,
    ) -> PlaneResult<ServiceSummary>;

    /// True once every deployment of the service has reached steady state.
    async fn service_stable(&self, cluster: &str, service: &str) -> PlaneResult<bool>;

    /// One page of container-instance ARNs, optionally filtered.
    async fn list_instances(
        &self,
        cluster: &str,
        filter: Option<&InstanceFilter>,
        next_token: Option<String>,
    ) -> PlaneResult<Page<String>>;

    /// Resolve ARNs to machine identifiers. At most
    /// [`DESCRIBE_INSTANCES_LIMIT`] ARNs per call.
    async fn describe_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> PlaneResult<Vec<InstanceIdentity>>;

    /// Launch times for machines. At most [`DESCRIBE_MACHINES_LIMIT`] ids
    /// per call; results may span several pages.
    async fn describe_machines(
        &self,
        machine_ids: &[String],
        next_token: Option<String>,
    ) -> PlaneResult<Page<MachineLaunch>>;

    /// Transition instances to `status`. Returns the instances the
    /// scheduler confirmed, with their machine identifiers.
    async fn update_instance_state(
        &self,
        cluster: &str,
        arns: &[String],
        status: InstanceStatus,
    ) -> PlaneResult<Vec<InstanceIdentity>>;

    async fn terminate_instance(
        &self,
        group: &str,
        machine_id: &str,
        decrement_desired: bool,
    ) -> PlaneResult<()>;

    async fn machines_terminated(&self, machine_ids: &[String]) -> PlaneResult<bool>;

    /// Set min and desired capacity; `max` is left unchanged when `None`.
    async fn update_group_capacity(
        &self,
        group: &str,
        min: u32,
        desired: u32,
        max: Option<u32>,
    ) -> PlaneResult<()>;

    async fn group_in_service(&self, group: &str) -> PlaneResult<bool>;

    async fn describe_group(&self, group: &str) -> PlaneResult<GroupCapacity>;
}
