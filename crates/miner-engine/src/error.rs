//! Error types for the mining engine.

use miner_core::TemplateError;
use thiserror::Error;

/// Errors raised by the coordinator and the config stores.
#[derive(Debug, Error)]
pub enum MinerError {
    /// Thread count or payout address failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The config file could not be read or written.
    #[error("config store I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for a [`MiningConfig`](crate::MiningConfig).
    #[error("config store JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Template or mempool fetch failed.
    #[error("template fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),

    /// The fetched template has malformed fields.
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
}

pub type Result<T, E = MinerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_fetch_keeps_provider_chain() {
        let err = MinerError::Fetch(anyhow::anyhow!("connection refused").context("GET /template"));
        assert_eq!(err.to_string(), "template fetch failed: GET /template");

        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "GET /template");
        assert_eq!(source.source().unwrap().to_string(), "connection refused");
    }
}
