//! fleetdown — scale a container cluster down by draining and terminating
//! instances in batches.
//!
//! # Usage
//!
//! ```text
//! fleetdown plan --fleet fleet.json --cluster prod --service graphql --asg prod-asg --desired-count 10
//! fleetdown run  --fleet fleet.json --config fleetdown.toml --batch-size 2 --write-fleet fleet.json
//! ```
//!
//! Exit status: 0 on success, 1 when a control-plane call fails or the
//! run is interrupted, 2 for invalid input, 3 when the fleet's state does
//! not allow the requested change.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fleetdown_core::ConfigError;
use fleetdown_scale::{DownscaleError, ErrorClass};

mod commands;

use commands::InputError;
use commands::args::DownscaleArgs;

#[derive(Parser)]
#[command(
    name = "fleetdown",
    about = "Scale an ECS cluster down, draining and terminating instances in batches",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain and terminate instances until the cluster reaches the desired count
    Run {
        #[command(flatten)]
        args: DownscaleArgs,
        /// Write the resulting fleet snapshot here
        #[arg(long)]
        write_fleet: Option<PathBuf>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show the candidates and batches a run would use, without changing anything
    Plan {
        #[command(flatten)]
        args: DownscaleArgs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fleetdown=debug"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let result = match cli.command {
        Commands::Run {
            args,
            write_fleet,
            format,
        } => commands::run::run(&args, write_fleet.as_deref(), &format).await,
        Commands::Plan { args, format } => commands::plan::plan(&args, &format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<DownscaleError>() {
        return match e.class() {
            ErrorClass::Configuration => 2,
            ErrorClass::Policy => 3,
            ErrorClass::ControlPlane => 1,
        };
    }
    if err.is::<ConfigError>() || err.is::<InputError>() {
        return 2;
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetdown_plane::PlaneError;

    #[test]
    fn exit_statuses() {
        let err = anyhow::Error::from(ConfigError::Missing("cluster"));
        assert_eq!(exit_status(&err), 2);

        let err = anyhow::Error::from(InputError {
            what: "cannot load fleet".to_string(),
            reason: "no such file".to_string(),
        });
        assert_eq!(exit_status(&err), 2);

        let err = anyhow::Error::from(DownscaleError::Mismatch {
            service_desired: 12,
            group_desired: 10,
        });
        assert_eq!(exit_status(&err), 3);

        let err = anyhow::Error::from(DownscaleError::from(PlaneError::Cancelled));
        assert_eq!(exit_status(&err), 1);

        assert_eq!(exit_status(&anyhow::anyhow!("disk full")), 1);
    }

    #[test]
    fn cli_parses_original_flags() {
        let cli = Cli::try_parse_from([
            "fleetdown",
            "run",
            "--fleet",
            "fleet.json",
            "--cluster",
            "prod",
            "--service",
            "graphql",
            "--asg",
            "prod-asg",
            "--desired-count",
            "10",
            "--batch-size",
            "2",
            "--instance-flip",
            "--sort-age",
            "--disable-task-count",
            "--agent-version-before",
            "1.35.0",
            "--allow-mismatch",
        ])
        .unwrap();

        let Commands::Run { args, .. } = cli.command else {
            panic!("expected run");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.batch_size, 2);
        assert!(config.instance_flip);
        assert!(config.sort_by_age);
        assert!(!config.task_count_detect);
        assert!(config.allow_mismatch);
        assert_eq!(config.agent_version_before.as_deref(), Some("1.35.0"));
    }

    #[test]
    fn fleet_is_required() {
        assert!(Cli::try_parse_from(["fleetdown", "plan", "--cluster", "prod"]).is_err());
    }
}
