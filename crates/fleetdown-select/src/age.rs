//! Age resolution — orders container instances by machine launch time.
//!
//! Container instance → machine id comes from the scheduler inventory
//! (at most 100 ARNs per call); machine id → launch time comes from the
//! machine inventory (at most 200 ids per call, paginated).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use fleetdown_plane::FleetClient;
use fleetdown_plane::plane::{DESCRIBE_INSTANCES_LIMIT, DESCRIBE_MACHINES_LIMIT};

use crate::error::{SelectError, SelectResult};

/// Look up the launch time of each container instance's machine.
///
/// Instances the inventories know nothing about are absent from the result.
pub async fn resolve_launch_times(
    client: &FleetClient,
    cluster: &str,
    arns: &[String],
) -> SelectResult<HashMap<String, DateTime<Utc>>> {
    let mut arn_by_machine: HashMap<String, String> = HashMap::new();
    let mut machine_ids = Vec::with_capacity(arns.len());

    for chunk in arns.chunks(DESCRIBE_INSTANCES_LIMIT) {
        for identity in client.describe_instances(cluster, chunk).await? {
            machine_ids.push(identity.machine_id.clone());
            arn_by_machine.insert(identity.machine_id, identity.arn);
        }
    }

    let mut launched = HashMap::with_capacity(machine_ids.len());
    for chunk in machine_ids.chunks(DESCRIBE_MACHINES_LIMIT) {
        let mut next_token = None;
        loop {
            let page = client.describe_machines(chunk, next_token).await?;
            for machine in page.items {
                if let Some(arn) = arn_by_machine.get(&machine.machine_id) {
                    launched.insert(arn.clone(), machine.launched_at);
                }
            }
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
    }

    debug!(
        requested = arns.len(),
        resolved = launched.len(),
        "resolved machine launch times"
    );
    Ok(launched)
}

/// Sort ARNs oldest machine first. Ties keep their listing order.
///
/// Fails without reordering anything if any launch time is unknown.
pub async fn sort_by_age(
    client: &FleetClient,
    cluster: &str,
    arns: Vec<String>,
) -> SelectResult<Vec<String>> {
    if arns.len() < 2 {
        return Ok(arns);
    }

    let launched = resolve_launch_times(client, cluster, &arns).await?;

    let mut keyed = Vec::with_capacity(arns.len());
    for arn in arns {
        match launched.get(&arn) {
            Some(at) => keyed.push((*at, arn)),
            None => return Err(SelectError::UnresolvedLaunchTime { arn }),
        }
    }
    keyed.sort_by_key(|(at, _)| *at);

    Ok(keyed.into_iter().map(|(_, arn)| arn).collect())
}
