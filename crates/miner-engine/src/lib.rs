//! Concurrent proof-of-work mining engine.
//!
//! This crate provides:
//! - A coordinator that refreshes the block template on a timer
//! - Worker threads sharing one atomic nonce counter per epoch
//! - Lossless statistics aggregation with a watchable snapshot
//! - Collaborator traits for template sources, block submission and config

pub mod api;
pub mod config;
pub mod error;
pub mod miner;
pub mod state;
pub mod stats;
pub mod tracing;
pub mod worker;

pub use api::{
    BlockPublisher, ChannelPublisher, LoggingPublisher, SolvedBlock, StaticTemplateProvider,
    TemplateProvider,
};
pub use config::{ConfigStore, CoordinatorSettings, JsonConfigStore, MemoryConfigStore, MiningConfig};
pub use error::MinerError;
pub use miner::MiningCoordinator;
pub use state::MiningStats;
pub use stats::{StatsAggregator, StatsEvent};
pub use worker::{NonceCounter, Worker, WorkerExit};

/// Get the library version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
