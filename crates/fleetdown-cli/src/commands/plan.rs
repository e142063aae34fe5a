use fleetdown_plane::CancelSignal;
use fleetdown_scale::{RunPlan, plan_downscale};

use super::args::DownscaleArgs;
use super::{client, load_fleet};

/// Show which instances a run would drain, and in which batches.
pub async fn plan(args: &DownscaleArgs, format: &str) -> anyhow::Result<()> {
    let config = args.to_config()?;
    config.validate()?;
    let plane = load_fleet(&args.fleet)?;

    let plan = plan_downscale(&client(&plane, &config, CancelSignal::never()), &config).await?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&plan)?),
        _ => print!("{}", format_plan(&plan)),
    }
    Ok(())
}

fn format_plan(plan: &RunPlan) -> String {
    let mut out = format!(
        "{} of {} instances drainable; service at {} tasks, up to {} removable\n",
        plan.selection.len(),
        plan.selection.total_instances,
        plan.service_desired,
        plan.max_to_remove
    );

    out.push_str("\nTiers:\n");
    for report in &plan.selection.tiers {
        if report.skipped {
            out.push_str(&format!("  {:<15} skipped\n", report.kind.label()));
        } else {
            out.push_str(&format!(
                "  {:<15} +{} ({} already taken)  {}\n",
                report.kind.label(),
                report.added,
                report.duplicates,
                report.filter.as_deref().unwrap_or("-")
            ));
        }
    }

    out.push_str(&format!("\nBatches (size {}):\n", plan.batches.batch_size));
    for batch in &plan.batches.batches {
        out.push_str(&format!("  {:>3}: {}\n", batch.index, batch.arns.join(", ")));
    }
    out
}
