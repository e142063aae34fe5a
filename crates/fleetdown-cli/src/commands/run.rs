use std::path::Path;

use tracing::{info, warn};

use fleetdown_plane::CancelSignal;
use fleetdown_scale::{ScaleDownOutcome, run_downscale};

use super::args::DownscaleArgs;
use super::{client, load_fleet};

pub async fn run(args: &DownscaleArgs, write_fleet: Option<&Path>, format: &str) -> anyhow::Result<()> {
    let (handle, cancel) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling after the current call");
            handle.cancel();
        }
    });

    let outcome = execute(args, write_fleet, cancel).await?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => print_outcome(&outcome),
    }
    Ok(())
}

/// Runs the scale-down and persists the fleet it leaves behind.
///
/// A failed run keeps its own error; a snapshot that cannot be written is
/// then only logged.
async fn execute(
    args: &DownscaleArgs,
    write_fleet: Option<&Path>,
    cancel: CancelSignal,
) -> anyhow::Result<ScaleDownOutcome> {
    let config = args.to_config()?;
    config.validate()?;
    let plane = load_fleet(&args.fleet)?;

    info!(
        cluster = %config.cluster,
        service = %config.service,
        asg = %config.group,
        region = %config.region,
        desired = config.desired_count,
        "scaling down"
    );
    let result = run_downscale(&client(&plane, &config, cancel), &config).await;

    let Some(path) = write_fleet else {
        return Ok(result?);
    };
    let saved = plane.save(path).await;
    match (result, saved) {
        (Ok(outcome), Ok(())) => {
            info!(path = %path.display(), "fleet snapshot written");
            Ok(outcome)
        }
        (Ok(_), Err(e)) => Err(e.context(format!(
            "scale-down finished but {} was not written",
            path.display()
        ))),
        (Err(run_err), Ok(())) => {
            info!(path = %path.display(), "fleet snapshot written");
            Err(run_err.into())
        }
        (Err(run_err), Err(save_err)) => {
            warn!(
                path = %path.display(),
                error = %format!("{save_err:#}"),
                "fleet snapshot not written"
            );
            Err(run_err.into())
        }
    }
}

fn print_outcome(outcome: &ScaleDownOutcome) {
    println!(
        "✓ Scaled down in {} batch(es), {} instance(s) terminated",
        outcome.batches,
        outcome.terminated.len()
    );
    for identity in &outcome.drained {
        println!("  {}  {}", identity.machine_id, identity.arn);
    }
    if outcome.restored {
        println!("  Service restored to {} tasks", outcome.final_service_desired);
    } else {
        println!("  Service desired: {}", outcome.final_service_desired);
    }
    if let Some(group) = outcome.group {
        println!(
            "  ASG capacity:    min {} / desired {} / max {}",
            group.min, group.desired, group.max
        );
    }
}
