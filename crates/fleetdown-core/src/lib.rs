pub mod config;
pub mod filter;
pub mod types;

pub use config::{ConfigError, DownscaleConfig, WaitConfig};
pub use filter::InstanceFilter;
pub use types::*;
