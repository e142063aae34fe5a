//! FleetClient — the run-scoped handle to the control plane.
//!
//! Wraps a `ControlPlane` with the run's cancellation signal and wait
//! policy. Every request first checks the signal, so a cancelled run
//! stops between calls; in-flight calls are never interrupted.

use std::sync::Arc;

use tracing::debug;

use fleetdown_core::{
    ClusterSummary, GroupCapacity, InstanceFilter, InstanceIdentity, InstanceStatus,
    MachineLaunch, Page, ServiceSummary,
};

use crate::error::PlaneResult;
use crate::plane::ControlPlane;
use crate::wait::{CancelSignal, WaitPolicy, poll_until};

#[derive(Clone)]
pub struct FleetClient {
    plane: Arc<dyn ControlPlane>,
    cancel: CancelSignal,
    wait: WaitPolicy,
}

impl FleetClient {
    pub fn new(plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            plane,
            cancel: CancelSignal::never(),
            wait: WaitPolicy::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    // ── Scheduler ──────────────────────────────────────────────────

    pub async fn describe_cluster(&self, cluster: &str) -> PlaneResult<ClusterSummary> {
        self.cancel.check()?;
        self.plane.describe_cluster(cluster).await
    }

    pub async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> PlaneResult<ServiceSummary> {
        self.cancel.check()?;
        self.plane.describe_service(cluster, service).await
    }

    /// Set the service's desired count and block until it is stable.
    pub async fn update_service_and_wait(
        &self,
        cluster: &str,
        service: &str,
        count: u32,
    ) -> PlaneResult<ServiceSummary> {
        self.cancel.check()?;
        let updated = self
            .plane
            .update_service_desired_count(cluster, service, count)
            .await?;
        self.wait_service_stable(cluster, service).await?;
        Ok(updated)
    }

    pub async fn wait_service_stable(&self, cluster: &str, service: &str) -> PlaneResult<()> {
        let plane = &self.plane;
        poll_until(&self.wait, &self.cancel, "service stable", move || {
            plane.service_stable(cluster, service)
        })
        .await
    }

    /// One page of a (filtered) instance listing.
    pub async fn list_instances(
        &self,
        cluster: &str,
        filter: Option<&InstanceFilter>,
        next_token: Option<String>,
    ) -> PlaneResult<Page<String>> {
        self.cancel.check()?;
        self.plane.list_instances(cluster, filter, next_token).await
    }

    /// Drain every page of a (filtered) instance listing, in listing order.
    pub async fn list_all_instances(
        &self,
        cluster: &str,
        filter: Option<&InstanceFilter>,
    ) -> PlaneResult<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token = None;
        let mut pages = 0u32;
        loop {
            let page = self.list_instances(cluster, filter, next_token).await?;
            pages += 1;
            arns.extend(page.items);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        debug!(%cluster, pages, instances = arns.len(), "listed container instances");
        Ok(arns)
    }

    pub async fn describe_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> PlaneResult<Vec<InstanceIdentity>> {
        self.cancel.check()?;
        self.plane.describe_instances(cluster, arns).await
    }

    pub async fn describe_machines(
        &self,
        machine_ids: &[String],
        next_token: Option<String>,
    ) -> PlaneResult<Page<MachineLaunch>> {
        self.cancel.check()?;
        self.plane.describe_machines(machine_ids, next_token).await
    }

    pub async fn drain_instances(
        &self,
        cluster: &str,
        arns: &[String],
    ) -> PlaneResult<Vec<InstanceIdentity>> {
        self.cancel.check()?;
        self.plane
            .update_instance_state(cluster, arns, InstanceStatus::Draining)
            .await
    }

    // ── Instance group ─────────────────────────────────────────────

    pub async fn describe_group(&self, group: &str) -> PlaneResult<GroupCapacity> {
        self.cancel.check()?;
        self.plane.describe_group(group).await
    }

    /// Update group capacity and block until the group is in service.
    pub async fn update_group_and_wait(
        &self,
        group: &str,
        min: u32,
        desired: u32,
        max: Option<u32>,
    ) -> PlaneResult<()> {
        self.cancel.check()?;
        self.plane
            .update_group_capacity(group, min, desired, max)
            .await?;
        let plane = &self.plane;
        poll_until(&self.wait, &self.cancel, "instance group in service", move || {
            plane.group_in_service(group)
        })
        .await
    }

    /// Terminate machines without decrementing the group's desired
    /// capacity, then block until every one is gone.
    pub async fn terminate_and_wait(&self, group: &str, machine_ids: &[String]) -> PlaneResult<()> {
        for machine_id in machine_ids {
            self.cancel.check()?;
            self.plane.terminate_instance(group, machine_id, false).await?;
        }
        let plane = &self.plane;
        poll_until(&self.wait, &self.cancel, "machines terminated", move || {
            plane.machines_terminated(machine_ids)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaneError;
    use crate::memory::{MemoryPlane, PlaneEvent};
    use crate::memory::tests::snapshot;

    fn client(plane: &MemoryPlane) -> FleetClient {
        FleetClient::new(Arc::new(plane.clone()))
    }

    #[tokio::test]
    async fn list_all_drains_every_page() {
        let mut snap = snapshot(7);
        snap.page_size = 3;
        let plane = MemoryPlane::from_snapshot(snap);

        let arns = client(&plane).list_all_instances("prod", None).await.unwrap();
        assert_eq!(arns.len(), 7);
        assert_eq!(arns[0], "arn:ci/0");
        assert_eq!(arns[6], "arn:ci/6");
    }

    #[tokio::test]
    async fn cancelled_client_issues_no_calls() {
        let plane = MemoryPlane::from_snapshot(snapshot(3));
        let (handle, signal) = CancelSignal::new();
        let client = client(&plane).with_cancel(signal);
        handle.cancel();

        let err = client
            .update_service_and_wait("prod", "graphql", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, PlaneError::Cancelled));
        assert!(plane.journal().await.is_empty());
    }

    #[tokio::test]
    async fn terminate_never_decrements_desired() {
        let plane = MemoryPlane::from_snapshot(snapshot(3));
        let client = client(&plane);

        client
            .terminate_and_wait("prod-asg", &["i-0".to_string(), "i-1".to_string()])
            .await
            .unwrap();

        let journal = plane.journal().await;
        assert_eq!(
            journal,
            vec![
                PlaneEvent::Terminated {
                    machine_id: "i-0".to_string(),
                    decrement_desired: false
                },
                PlaneEvent::Terminated {
                    machine_id: "i-1".to_string(),
                    decrement_desired: false
                },
            ]
        );
        assert_eq!(client.describe_group("prod-asg").await.unwrap().desired, 3);
    }
}
