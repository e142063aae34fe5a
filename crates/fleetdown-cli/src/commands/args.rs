use std::path::PathBuf;

use clap::Args;

use fleetdown_core::DownscaleConfig;

use super::InputError;

/// Run parameters. Flags override values from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct DownscaleArgs {
    /// TOML file with run parameters
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Fleet snapshot (JSON) to run against
    #[arg(long)]
    pub fleet: PathBuf,

    /// ECS cluster
    #[arg(long)]
    pub cluster: Option<String>,

    /// ECS service
    #[arg(long)]
    pub service: Option<String>,

    /// Auto scaling group backing the cluster
    #[arg(long)]
    pub asg: Option<String>,

    /// Number of container instances to keep
    #[arg(long)]
    pub desired_count: Option<u32>,

    /// Instances drained and terminated per batch (default 1)
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Prefer terminating this instance type
    #[arg(long)]
    pub instance_type: Option<String>,

    /// AWS region (default us-west-2)
    #[arg(long)]
    pub region: Option<String>,

    /// Lower only the service count and restore it at the end
    #[arg(long)]
    pub instance_flip: bool,

    /// Terminate the oldest instances first
    #[arg(long)]
    pub sort_age: bool,

    /// Do not prefer lightly loaded instances
    #[arg(long)]
    pub disable_task_count: bool,

    /// Prefer instances with an ECS agent older than this version
    #[arg(long)]
    pub agent_version_before: Option<String>,

    /// Proceed when service and ASG desired counts disagree
    #[arg(long)]
    pub allow_mismatch: bool,
}

impl DownscaleArgs {
    /// Load `--config` (if given) and apply flags on top.
    pub fn to_config(&self) -> anyhow::Result<DownscaleConfig> {
        let mut config = match &self.config {
            Some(path) => DownscaleConfig::from_file(path).map_err(|e| {
                InputError::new(format!("cannot load config {}", path.display()), &e)
            })?,
            None => DownscaleConfig::default(),
        };

        if let Some(cluster) = &self.cluster {
            config.cluster = cluster.clone();
        }
        if let Some(service) = &self.service {
            config.service = service.clone();
        }
        if let Some(asg) = &self.asg {
            config.group = asg.clone();
        }
        if let Some(n) = self.desired_count {
            config.desired_count = n;
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(t) = &self.instance_type {
            config.instance_type = Some(t.clone());
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(v) = &self.agent_version_before {
            config.agent_version_before = Some(v.clone());
        }
        config.instance_flip |= self.instance_flip;
        config.sort_by_age |= self.sort_age;
        config.allow_mismatch |= self.allow_mismatch;
        if self.disable_task_count {
            config.task_count_detect = false;
        }

        Ok(config)
    }
}
