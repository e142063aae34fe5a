pub mod args;
pub mod plan;
pub mod run;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use fleetdown_core::DownscaleConfig;
use fleetdown_plane::{CancelSignal, FleetClient, MemoryPlane, WaitPolicy};

/// A config or fleet file that could not be used.
#[derive(Debug, Error)]
#[error("{what}: {reason}")]
pub struct InputError {
    pub what: String,
    pub reason: String,
}

impl InputError {
    pub fn new(what: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            what: what.into(),
            reason: format!("{err:#}"),
        }
    }
}

pub fn load_fleet(path: &Path) -> anyhow::Result<MemoryPlane> {
    MemoryPlane::load(path)
        .map_err(|e| InputError::new(format!("cannot load fleet {}", path.display()), &e).into())
}

pub fn client(plane: &MemoryPlane, config: &DownscaleConfig, cancel: CancelSignal) -> FleetClient {
    FleetClient::new(Arc::new(plane.clone()))
        .with_cancel(cancel)
        .with_wait_policy(WaitPolicy::from(&config.wait))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use fleetdown_scale::plan_downscale;

    fn demo(file: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(file)
    }

    #[tokio::test]
    async fn demo_files_plan_cleanly() {
        let args = args::DownscaleArgs {
            config: Some(demo("fleetdown.toml")),
            fleet: demo("fleet.json"),
            ..Default::default()
        };
        let config = args.to_config().unwrap();
        config.validate().unwrap();

        let plane = load_fleet(&args.fleet).unwrap();
        let plan = plan_downscale(&client(&plane, &config, CancelSignal::never()), &config)
            .await
            .unwrap();
        assert_eq!(plan.selection.len(), 3);
        assert_eq!(plan.batches.len(), 2);
    }

    #[test]
    fn missing_fleet_is_an_input_error() {
        let Err(err) = load_fleet(Path::new("/nonexistent/fleet.json")) else {
            panic!("expected an input error");
        };
        assert!(err.is::<InputError>());
    }
}
