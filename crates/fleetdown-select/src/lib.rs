//! fleetdown drainable instance selector — priority tiers, dedup, age ordering.
//!
//! Decides which container instances to remove when shrinking a cluster.
//! It does NOT drain or terminate anything (that's `fleetdown-scale`).
//!
//! # Components
//!
//! - **`tier`** — Ordered tier descriptors (stale agent, machine type, low task count, catch-all)
//! - **`age`** — Launch-time lookup and oldest-first ordering
//! - **`selector`** — Tier walk, pagination, dedup, truncation

pub mod age;
pub mod error;
pub mod selector;
pub mod tier;

pub use age::{resolve_launch_times, sort_by_age};
pub use error::{SelectError, SelectResult};
pub use selector::{Candidate, Selection, TierReport, select_drainable};
pub use tier::{Tier, TierFilter, TierKind, build_tiers};
