//! End-to-end scale-down scenarios.
//!
//! Runs selection and orchestration against an in-memory fleet and checks
//! the resulting fleet state and the sequence of mutating calls.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use fleetdown_core::{ContainerInstance, DownscaleConfig, InstanceStatus};
use fleetdown_plane::{
    CancelSignal, FleetClient, FleetSnapshot, GroupRecord, MemoryPlane, PlaneError, PlaneEvent,
    WaitPolicy,
};
use fleetdown_scale::{DownscaleError, ErrorClass, plan_downscale, run_downscale};
use fleetdown_select::TierKind;

fn instance(i: u32) -> ContainerInstance {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    ContainerInstance {
        arn: format!("arn:ci/{i}"),
        machine_id: format!("i-{i}"),
        machine_type: "m5.large".to_string(),
        agent_version: "1.40.0".to_string(),
        running_tasks: 3,
        status: InstanceStatus::Active,
        launched_at: Some(base + chrono::Duration::hours(i64::from(i))),
    }
}

fn fleet(instances: Vec<ContainerInstance>) -> MemoryPlane {
    let n = instances.len() as u32;
    MemoryPlane::from_snapshot(FleetSnapshot {
        cluster: "prod".to_string(),
        active_services: Some(2),
        service: "graphql".to_string(),
        service_desired: n,
        group: GroupRecord {
            name: "prod-asg".to_string(),
            min: n,
            desired: n,
            max: n + 10,
        },
        instances,
        page_size: 5,
        terminated: Vec::new(),
    })
}

fn config(desired: u32) -> DownscaleConfig {
    DownscaleConfig {
        cluster: "prod".to_string(),
        service: "graphql".to_string(),
        group: "prod-asg".to_string(),
        desired_count: desired,
        ..Default::default()
    }
}

fn fast_waits() -> WaitPolicy {
    WaitPolicy {
        interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(4),
        max_attempts: 10,
    }
}

#[tokio::test]
async fn twelve_down_to_ten_one_at_a_time() {
    let plane = fleet((0..12).map(instance).collect());
    let client = FleetClient::new(Arc::new(plane.clone()));

    let outcome = run_downscale(&client, &config(10)).await.unwrap();
    assert_eq!(outcome.batches, 2);
    assert_eq!(outcome.terminated, vec!["i-0", "i-1"]);

    // Intermediate group updates only ever lower desired and min, and
    // never touch the ceiling.
    let journal = plane.journal().await;
    let mut last_desired = 12;
    for event in &journal[..journal.len() - 1] {
        if let PlaneEvent::GroupCapacity { min, desired, max } = event {
            assert!(*desired < last_desired);
            assert!(min <= desired);
            assert_eq!(*max, None);
            last_desired = *desired;
        }
    }
    assert_eq!(
        journal.last(),
        Some(&PlaneEvent::GroupCapacity {
            min: 10,
            desired: 10,
            max: Some(10)
        })
    );

    let snap = plane.snapshot().await;
    assert_eq!(snap.service_desired, 10);
    assert_eq!(snap.instances.len(), 10);
    assert!(snap.instances.iter().all(|ci| ci.status == InstanceStatus::Active));
}

#[tokio::test]
async fn stale_agents_go_first_oldest_first() {
    let mut instances: Vec<ContainerInstance> = (0..8).map(instance).collect();
    // Two stale agents, the newer machine listed first.
    instances[3].agent_version = "1.29.1".to_string();
    instances[6].agent_version = "1.30.0".to_string();
    instances[6].launched_at = Some(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap());
    // One lightly loaded instance.
    instances[5].running_tasks = 1;

    let plane = fleet(instances);
    let client = FleetClient::new(Arc::new(plane.clone()));
    let mut cfg = config(5);
    cfg.agent_version_before = Some("1.35.0".to_string());
    cfg.sort_by_age = true;
    cfg.batch_size = 2;

    let plan = plan_downscale(&client, &cfg).await.unwrap();
    let picked: Vec<(&str, TierKind)> = plan
        .selection
        .candidates
        .iter()
        .map(|c| (c.arn.as_str(), c.tier))
        .collect();
    assert_eq!(
        picked,
        vec![
            ("arn:ci/6", TierKind::StaleAgent),
            ("arn:ci/3", TierKind::StaleAgent),
            ("arn:ci/5", TierKind::LowTaskCount),
        ]
    );
    assert_eq!(plan.batches.len(), 2);

    let outcome = run_downscale(&client, &cfg).await.unwrap();
    assert_eq!(outcome.terminated, vec!["i-6", "i-3", "i-5"]);
    assert_eq!(outcome.final_service_desired, 5);
}

#[tokio::test]
async fn flip_mode_cycles_tasks_without_shrinking_the_group() {
    let plane = fleet((0..190).map(instance).collect());
    let client = FleetClient::new(Arc::new(plane.clone()));
    let mut cfg = config(181);
    cfg.instance_flip = true;
    cfg.batch_size = 3;
    cfg.task_count_detect = false;

    let outcome = run_downscale(&client, &cfg).await.unwrap();
    assert_eq!(outcome.batches, 3);
    assert!(outcome.restored);

    let snap = plane.snapshot().await;
    assert_eq!(snap.service_desired, 190);
    assert_eq!((snap.group.min, snap.group.desired, snap.group.max), (190, 190, 200));
    assert_eq!(snap.instances.len(), 181);
}

#[tokio::test]
async fn slow_convergence_still_completes() {
    let plane = fleet((0..4).map(instance).collect());
    plane.set_settle_probes(3).await;
    let client = FleetClient::new(Arc::new(plane.clone())).with_wait_policy(fast_waits());

    let outcome = run_downscale(&client, &config(2)).await.unwrap();
    assert_eq!(outcome.terminated.len(), 2);
}

#[tokio::test]
async fn convergence_that_never_comes_gives_up() {
    let plane = fleet((0..4).map(instance).collect());
    plane.set_settle_probes(1_000).await;
    let client = FleetClient::new(Arc::new(plane.clone())).with_wait_policy(fast_waits());

    let err = run_downscale(&client, &config(2)).await.unwrap_err();
    assert!(matches!(
        err,
        DownscaleError::Plane(PlaneError::WaitExhausted { attempts: 10, .. })
    ));
    assert_eq!(err.class(), ErrorClass::ControlPlane);
}

#[tokio::test]
async fn cancelling_mid_wait_stops_the_run() {
    let plane = fleet((0..4).map(instance).collect());
    plane.set_settle_probes(1_000).await;
    let (handle, signal) = CancelSignal::new();
    let client = FleetClient::new(Arc::new(plane.clone()))
        .with_cancel(signal)
        .with_wait_policy(WaitPolicy {
            interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(5),
            max_attempts: 10_000,
        });

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let err = run_downscale(&client, &config(2)).await.unwrap_err();
    canceller.await.unwrap();
    assert!(matches!(err, DownscaleError::Plane(PlaneError::Cancelled)));

    // Stopped while waiting for the first service update to settle.
    let journal = plane.journal().await;
    assert!(
        !journal
            .iter()
            .any(|e| matches!(e, PlaneEvent::Terminated { .. }))
    );
}
