//! Drainable instance selector.
//!
//! Walks the tiers in priority order. Each enabled tier lists every page
//! of its filtered listing, drops instances an earlier tier already
//! claimed, optionally sorts what remains oldest-first, and appends it.
//! The merged list is truncated to the number of instances that must go
//! to reach the desired count.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use fleetdown_core::{DownscaleConfig, InstanceFilter};
use fleetdown_plane::FleetClient;

use crate::age::sort_by_age;
use crate::error::{SelectError, SelectResult};
use crate::tier::{TierFilter, TierKind, build_tiers, drain_at_task_count};

/// An instance chosen for removal, with the tier that claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub arn: String,
    pub tier: TierKind,
}

/// What one tier contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierReport {
    pub kind: TierKind,
    /// Query string used for the listing, if any.
    pub filter: Option<String>,
    pub added: usize,
    pub duplicates: usize,
    /// The tier was not evaluated.
    pub skipped: bool,
}

/// Ordered, duplicate-free removal candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    pub tiers: Vec<TierReport>,
    /// Distinct instances registered with the cluster.
    pub total_instances: usize,
}

impl Selection {
    pub fn arns(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.arn.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Select `current - desired` instances to drain, best candidates first.
pub async fn select_drainable(
    client: &FleetClient,
    config: &DownscaleConfig,
) -> SelectResult<Selection> {
    let cluster = config.cluster.as_str();
    let tiers = build_tiers(config)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut reports = Vec::with_capacity(tiers.len());

    for tier in &tiers {
        if !tier.enabled {
            debug!(tier = tier.kind.label(), "tier not configured, skipping");
            reports.push(skipped(tier.kind));
            continue;
        }

        let filter = match &tier.filter {
            TierFilter::Fixed(f) => Some(f.clone()),
            TierFilter::Unfiltered => None,
            TierFilter::LowTaskCount => {
                let summary = client.describe_cluster(cluster).await?;
                let services = summary
                    .active_services
                    .ok_or_else(|| SelectError::MissingServiceCount {
                        cluster: cluster.to_string(),
                    })?;
                match drain_at_task_count(services) {
                    Some(n) => Some(InstanceFilter::RunningTasksAtMost(n)),
                    None => {
                        info!(%cluster, "cluster has no active services, no instance is lightly loaded");
                        reports.push(skipped(tier.kind));
                        continue;
                    }
                }
            }
        };

        let listed = client.list_all_instances(cluster, filter.as_ref()).await?;
        let mut fresh = Vec::new();
        let mut duplicates = 0;
        for arn in listed {
            if seen.insert(arn.clone()) {
                fresh.push(arn);
            } else {
                duplicates += 1;
            }
        }

        if tier.sort_by_age && fresh.len() > 1 {
            fresh = sort_by_age(client, cluster, fresh).await?;
        }

        let query = filter.as_ref().map(ToString::to_string);
        info!(
            tier = tier.kind.label(),
            filter = query.as_deref().unwrap_or("<none>"),
            added = fresh.len(),
            duplicates,
            "added instances to candidates"
        );

        reports.push(TierReport {
            kind: tier.kind,
            filter: query,
            added: fresh.len(),
            duplicates,
            skipped: false,
        });
        candidates.extend(fresh.into_iter().map(|arn| Candidate {
            arn,
            tier: tier.kind,
        }));
    }

    // With c instances running and d desired, drain c - d.
    let total = candidates.len();
    let desired = config.desired_count as usize;
    if total <= desired {
        return Err(SelectError::InsufficientInstances {
            desired: config.desired_count,
            running: total,
        });
    }
    candidates.truncate(total - desired);

    Ok(Selection {
        candidates,
        tiers: reports,
        total_instances: total,
    })
}

fn skipped(kind: TierKind) -> TierReport {
    TierReport {
        kind,
        filter: None,
        added: 0,
        duplicates: 0,
        skipped: true,
    }
}
