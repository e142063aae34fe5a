//! Wires the selector into the orchestrator for a whole run.

use serde::Serialize;
use tracing::info;

use fleetdown_core::DownscaleConfig;
use fleetdown_plane::FleetClient;
use fleetdown_select::{Selection, select_drainable};

use crate::error::{DownscaleError, DownscaleResult};
use crate::orchestrator::{Orchestrator, ScaleDownOutcome};
use crate::plan::BatchPlan;

/// What a run would do, without touching the fleet.
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub selection: Selection,
    pub batches: BatchPlan,
    pub service_desired: u32,
    pub max_to_remove: u32,
}

/// Select drainable instances and scale the fleet down to the configured
/// desired count.
pub async fn run_downscale(
    client: &FleetClient,
    config: &DownscaleConfig,
) -> DownscaleResult<ScaleDownOutcome> {
    config.validate()?;

    let selection = select_drainable(client, config).await?;
    info!(
        cluster = %config.cluster,
        count = selection.len(),
        "found drainable container instances"
    );

    Orchestrator::new(client, config)
        .run(&selection.arns())
        .await
}

/// Selection and batch planning only. Issues read calls and nothing else.
pub async fn plan_downscale(
    client: &FleetClient,
    config: &DownscaleConfig,
) -> DownscaleResult<RunPlan> {
    config.validate()?;

    let selection = select_drainable(client, config).await?;
    let service = client
        .describe_service(&config.cluster, &config.service)
        .await?;

    let max_to_remove = service.desired_count.saturating_sub(config.desired_count);
    if max_to_remove == 0 {
        return Err(DownscaleError::NoRoomToDecrease {
            candidates: selection.len(),
            current: service.desired_count,
            target: config.desired_count,
        });
    }

    let batches = BatchPlan::new(&selection.arns(), config.batch_size, max_to_remove);
    info!(
        candidates = selection.len(),
        batches = batches.len(),
        max_to_remove,
        "planned scale-down"
    );

    Ok(RunPlan {
        selection,
        batches,
        service_desired: service.desired_count,
        max_to_remove,
    })
}
