//! Scale-down error types.

use thiserror::Error;

use fleetdown_core::ConfigError;
use fleetdown_plane::PlaneError;
use fleetdown_select::SelectError;

/// Errors that abort a scale-down run.
#[derive(Debug, Error)]
pub enum DownscaleError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Plane(#[from] PlaneError),

    #[error(
        "though we had {candidates} drainable instances, no room to decrease the service below {current} desired tasks (target {target}); aborting"
    )]
    NoRoomToDecrease {
        candidates: usize,
        current: u32,
        target: u32,
    },

    #[error(
        "mismatched container and instance count {service_desired} != {group_desired} not allowed; use --allow-mismatch to allow"
    )]
    Mismatch {
        service_desired: u32,
        group_desired: u32,
    },
}

/// Broad category of a failure, for operators and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing or invalid parameters; nothing was touched.
    Configuration,
    /// A control-plane call failed or the run was cancelled.
    ControlPlane,
    /// The fleet's state does not allow the requested change.
    Policy,
}

impl DownscaleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DownscaleError::Config(_) => ErrorClass::Configuration,
            DownscaleError::Select(SelectError::Config(_)) => ErrorClass::Configuration,
            DownscaleError::Select(SelectError::Plane(_)) => ErrorClass::ControlPlane,
            DownscaleError::Select(_) => ErrorClass::Policy,
            DownscaleError::Plane(_) => ErrorClass::ControlPlane,
            DownscaleError::NoRoomToDecrease { .. } => ErrorClass::Policy,
            DownscaleError::Mismatch { .. } => ErrorClass::Policy,
        }
    }
}

pub type DownscaleResult<T> = Result<T, DownscaleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        let e = DownscaleError::from(ConfigError::Missing("cluster"));
        assert_eq!(e.class(), ErrorClass::Configuration);

        let e = DownscaleError::from(PlaneError::Cancelled);
        assert_eq!(e.class(), ErrorClass::ControlPlane);

        let e = DownscaleError::from(SelectError::Plane(PlaneError::Cancelled));
        assert_eq!(e.class(), ErrorClass::ControlPlane);

        let e = DownscaleError::from(SelectError::InsufficientInstances {
            desired: 3,
            running: 2,
        });
        assert_eq!(e.class(), ErrorClass::Policy);

        let e = DownscaleError::Mismatch {
            service_desired: 12,
            group_desired: 11,
        };
        assert_eq!(e.class(), ErrorClass::Policy);
    }

    #[test]
    fn mismatch_message_names_the_override() {
        let e = DownscaleError::Mismatch {
            service_desired: 12,
            group_desired: 11,
        };
        assert!(e.to_string().contains("12 != 11"));
        assert!(e.to_string().contains("--allow-mismatch"));
    }
}
