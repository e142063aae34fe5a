//! fleetdown batch scale-down — drain, rebalance, terminate.
//!
//! Shrinks a cluster from its current size to a target size in batches,
//! keeping the scheduler's desired task count and the instance group's
//! desired capacity in lock-step. In flip mode only the scheduler count
//! moves and is restored at the end, letting the instance group replace
//! the drained machines.
//!
//! # Components
//!
//! - **`plan`** — Batch slicing of the candidate list
//! - **`orchestrator`** — Per-batch state machine (drain, scale, terminate, finalize)
//! - **`driver`** — Selector → orchestrator wiring for a whole run

pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod plan;

pub use driver::{RunPlan, plan_downscale, run_downscale};
pub use error::{DownscaleError, DownscaleResult, ErrorClass};
pub use orchestrator::{Orchestrator, ScaleDownOutcome, ScaleDownRun, ScalePhase};
pub use plan::{Batch, BatchPlan};
