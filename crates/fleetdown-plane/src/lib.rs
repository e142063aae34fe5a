//! fleetdown-plane — the Fleet Control Plane seam.
//!
//! The scale-down core never talks to a cloud API directly. It goes
//! through the [`ControlPlane`] trait, one async method per primitive
//! (describe, filtered listing, state transition, capacity update,
//! termination) plus boolean probes for convergence.
//!
//! # Architecture
//!
//! ```text
//! FleetClient (one per run)
//!   ├── Arc<dyn ControlPlane>   cloud bindings, or MemoryPlane
//!   ├── CancelSignal            checked before every call and during waits
//!   └── WaitPolicy              poll_until() backoff for stable / in-service / terminated
//! ```
//!
//! `MemoryPlane` simulates a fleet in memory. It backs the test suites
//! and the CLI's snapshot mode.

pub mod client;
pub mod error;
pub mod memory;
pub mod plane;
pub mod wait;

pub use client::FleetClient;
pub use error::{PlaneError, PlaneResult};
pub use memory::{FleetSnapshot, GroupRecord, MemoryPlane, PlaneEvent, PlaneOp};
pub use plane::ControlPlane;
pub use wait::{Backoff, CancelHandle, CancelSignal, WaitPolicy, poll_until};
