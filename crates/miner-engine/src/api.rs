//! Collaborator seams: where templates come from and where solved blocks go.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use miner_core::{BlockHeader, BlockTemplate, Transaction};
use tokio::sync::mpsc;

use crate::tracing::prelude::*;

/// Source of chain-tip templates and pending transactions.
///
/// Implementations usually sit on a network client; any failure is logged
/// by the refresh loop and retried.
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    async fn fetch_template(&self) -> anyhow::Result<BlockTemplate>;

    async fn fetch_transactions(&self) -> anyhow::Result<Vec<Transaction>>;
}

/// Receives solved blocks for network submission.
///
/// Called from worker threads; must not block for long.
pub trait BlockPublisher: Send + Sync {
    fn publish(&self, template: &BlockTemplate, transactions: &[Transaction]);
}

/// Serves the same template and mempool on every fetch.
#[derive(Debug, Clone)]
pub struct StaticTemplateProvider {
    template: BlockTemplate,
    transactions: Vec<Transaction>,
    live_timestamp: bool,
}

impl StaticTemplateProvider {
    pub fn new(template: BlockTemplate, transactions: Vec<Transaction>) -> Self {
        StaticTemplateProvider {
            template,
            transactions,
            live_timestamp: false,
        }
    }

    /// Stamp each fetched template with the current time, so every refresh
    /// opens a fresh header search space.
    pub fn with_live_timestamp(mut self) -> Self {
        self.live_timestamp = true;
        self
    }
}

#[async_trait]
impl TemplateProvider for StaticTemplateProvider {
    async fn fetch_template(&self) -> anyhow::Result<BlockTemplate> {
        let mut template = self.template.clone();
        if self.live_timestamp {
            template.timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as u32;
        }
        Ok(template)
    }

    async fn fetch_transactions(&self) -> anyhow::Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }
}

/// Logs solved blocks instead of submitting them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPublisher;

impl BlockPublisher for LoggingPublisher {
    fn publish(&self, template: &BlockTemplate, transactions: &[Transaction]) {
        match BlockHeader::from_template(template) {
            Ok(header) => info!(
                height = template.height,
                nonce = header.nonce,
                hash = %hex::encode(header.hash()),
                transactions = transactions.len(),
                "Solved block ready for submission"
            ),
            Err(e) => warn!("Solved block has an unparseable header: {e}"),
        }
    }
}

/// A solved block as handed to a [`BlockPublisher`].
#[derive(Debug, Clone)]
pub struct SolvedBlock {
    pub template: BlockTemplate,
    pub transactions: Vec<Transaction>,
}

/// Forwards solved blocks over a channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<SolvedBlock>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SolvedBlock>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelPublisher { tx }, rx)
    }
}

impl BlockPublisher for ChannelPublisher {
    fn publish(&self, template: &BlockTemplate, transactions: &[Transaction]) {
        let block = SolvedBlock {
            template: template.clone(),
            transactions: transactions.to_vec(),
        };
        if self.tx.send(block).is_err() {
            debug!("Solved block dropped: receiver closed");
        }
    }
}
