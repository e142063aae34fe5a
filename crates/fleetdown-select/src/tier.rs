//! Selection tiers for drain candidates.
//!
//! Candidates are picked from four tiers, highest priority first:
//! - **Stale agent**: agent version older than the configured threshold
//! - **Machine type**: instances of the preferred machine type
//! - **Low task count**: instances running at most `active services - 1` tasks
//! - **Catch-all**: everything else
//!
//! Each tier is a descriptor (trigger, filter, post-processing flag). The
//! selector walks them in order with a single loop.

use serde::{Deserialize, Serialize};

use fleetdown_core::{ConfigError, DownscaleConfig, InstanceFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierKind {
    StaleAgent,
    MachineType,
    LowTaskCount,
    CatchAll,
}

impl TierKind {
    pub fn label(&self) -> &'static str {
        match self {
            TierKind::StaleAgent => "stale-agent",
            TierKind::MachineType => "machine-type",
            TierKind::LowTaskCount => "low-task-count",
            TierKind::CatchAll => "catch-all",
        }
    }
}

/// How a tier's listing is filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierFilter {
    /// Filter known up front from configuration.
    Fixed(InstanceFilter),
    /// `runningTasksCount <= N`, where N is derived from the cluster's
    /// active service count at selection time.
    LowTaskCount,
    /// No filter: every registered instance.
    Unfiltered,
}

/// A tier descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub kind: TierKind,
    /// Whether the tier's trigger is configured. Disabled tiers contribute nothing.
    pub enabled: bool,
    pub filter: TierFilter,
    /// Order this tier's contribution oldest-first before appending it.
    pub sort_by_age: bool,
}

/// Build all tiers from configuration, in priority order.
pub fn build_tiers(config: &DownscaleConfig) -> Result<Vec<Tier>, ConfigError> {
    let sort_by_age = config.sort_by_age;
    let threshold = config.agent_threshold()?;
    let machine_type = config.preferred_machine_type();

    Ok(vec![
        Tier {
            kind: TierKind::StaleAgent,
            enabled: threshold.is_some(),
            filter: match threshold {
                Some(v) => TierFilter::Fixed(InstanceFilter::AgentVersionBelow(v)),
                None => TierFilter::Unfiltered,
            },
            sort_by_age,
        },
        Tier {
            kind: TierKind::MachineType,
            enabled: machine_type.is_some(),
            filter: match machine_type {
                Some(t) => TierFilter::Fixed(InstanceFilter::MachineType(t.to_string())),
                None => TierFilter::Unfiltered,
            },
            sort_by_age,
        },
        Tier {
            kind: TierKind::LowTaskCount,
            enabled: config.task_count_detect,
            filter: TierFilter::LowTaskCount,
            sort_by_age,
        },
        Tier {
            kind: TierKind::CatchAll,
            enabled: true,
            filter: TierFilter::Unfiltered,
            sort_by_age,
        },
    ])
}

/// Number of running tasks at or below which an instance counts as
/// lightly loaded.
///
/// With two services (say graphql, plus a daemon running on every
/// instance) the threshold is 1: once graphql's task is gone only the
/// daemon remains. A busier instance running 2 graphql tasks and the
/// daemon is still above the threshold. `None` when the cluster has no
/// active services, in which case nothing qualifies.
pub fn drain_at_task_count(active_services: u32) -> Option<u32> {
    active_services.checked_sub(1)
}
