//! Mining daemon: mines a fixed demo template until interrupted.
//!
//! Environment:
//! - `MINERD_CONFIG`: path of the JSON config (default `minerd.json`)
//! - `MINERD_DIFFICULTY`: template difficulty (default `24`)
//! - `RUST_LOG`: log filter (default `info`)

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use miner_core::BlockTemplate;
use miner_engine::tracing::prelude::*;
use miner_engine::{
    ConfigStore, CoordinatorSettings, JsonConfigStore, LoggingPublisher, MiningCoordinator,
    StaticTemplateProvider,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    miner_engine::tracing::init();

    let path = env::var("MINERD_CONFIG").unwrap_or_else(|_| "minerd.json".to_string());
    let store = Arc::new(JsonConfigStore::new(&path));
    let config = store
        .load()
        .with_context(|| format!("failed to load config from {path}"))?;
    config
        .validate()
        .with_context(|| format!("config at {path} is not usable"))?;

    let difficulty = match env::var("MINERD_DIFFICULTY") {
        Ok(value) => value
            .parse::<f64>()
            .with_context(|| format!("MINERD_DIFFICULTY is not a number: {value}"))?,
        Err(_) => 24.0,
    };

    info!(
        version = miner_engine::version(),
        threads = config.threads,
        address = %config.address,
        difficulty,
        "minerd starting"
    );

    let template = BlockTemplate {
        version: 1,
        previous_block_hash: "0".repeat(64),
        merkle_root: String::new(),
        timestamp: 0,
        bits: "1d00ffff".to_string(),
        height: 1,
        difficulty,
        nonce: None,
    };
    let provider = StaticTemplateProvider::new(template, Vec::new()).with_live_timestamp();

    let coordinator = MiningCoordinator::new(
        Arc::new(provider),
        Arc::new(LoggingPublisher),
        store,
        CoordinatorSettings::default(),
    );
    coordinator.start();

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    status.tick().await;

    loop {
        tokio::select! {
            _ = status.tick() => {
                let stats = coordinator.stats();
                info!(
                    hash_rate = %stats.format_hash_rate(),
                    total_hashes = stats.total_hashes,
                    best_match_bits = stats.best_match_bits,
                    blocks_found = stats.blocks_found,
                    "Status"
                );
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {e}");
                }
                break;
            }
        }
    }

    coordinator.stop();
    Ok(())
}
