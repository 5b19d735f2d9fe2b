//! # Caulk Common Crate
//!
//! Shared building blocks for the pull/seal scheduling engine.
//!
//! ## Modules
//! - `config`: typed configuration with strategy normalization
//! - `cid`: content-id parsing and fleet sharding math
//! - `chain_math`: block height to wall-clock estimation
//! - `weighted`: weighted random selection over pull sources
//! - `types`: the closed set of file-record sources
//! - `util`: timestamp and size helpers

pub mod chain_math;
pub mod cid;
pub mod config;
pub mod types;
pub mod util;
pub mod weighted;

pub use chain_math::BlockAndTime;
pub use config::{Config, NodeConfig, SchedulerConfig, StrategyWeights};
pub use types::Source;
