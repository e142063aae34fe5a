//! Selector error types.

use thiserror::Error;

use fleetdown_core::ConfigError;
use fleetdown_plane::PlaneError;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("{desired} container instances are desired, but there are only {running} currently running")]
    InsufficientInstances { desired: u32, running: usize },

    #[error("cluster {cluster:?} did not report an active services count")]
    MissingServiceCount { cluster: String },

    #[error("launch time unknown for container instance {arn}")]
    UnresolvedLaunchTime { arn: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plane(#[from] PlaneError),
}

pub type SelectResult<T> = Result<T, SelectError>;
