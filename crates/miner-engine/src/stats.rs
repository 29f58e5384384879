//! Single-owner aggregation of worker and coordinator statistics.
//!
//! Workers never touch [`MiningStats`] directly. They count locally and send
//! [`StatsEvent`] deltas; one aggregator task applies them in arrival order
//! and republishes the snapshot on a watch channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::state::MiningStats;

/// Sending half used by workers and the coordinator.
pub type StatsSender = mpsc::UnboundedSender<StatsEvent>;

/// A change to the shared statistics.
#[derive(Debug, Clone)]
pub enum StatsEvent {
    /// Mining switched on.
    Started { start_time: u64 },

    /// A new template epoch began with `threads` workers.
    EpochStarted {
        epoch: u64,
        threads: usize,
        height: i32,
        difficulty: f64,
        transactions: usize,
        total_fees: i64,
    },

    /// Counters a worker accumulated over `elapsed`.
    Progress {
        epoch: u64,
        worker: usize,
        hashes: u64,
        attempts: u64,
        best_match_bits: u32,
        elapsed: Duration,
    },

    /// A worker found a hash below target.
    BlockFound {
        epoch: u64,
        worker: usize,
        hash: String,
    },

    /// A worker stopped hashing on its own, after a solve or with the nonce
    /// space used up. Cancelled workers do not send this.
    WorkerExited { epoch: u64, worker: usize },

    /// Mining switched off.
    Stopped,
}

/// Owner of the statistics record.
#[derive(Debug)]
pub struct StatsAggregator {
    stats: MiningStats,
    epoch: u64,
    /// Smoothed rate per worker slot of the current epoch.
    rates: Vec<f64>,
    snapshot: watch::Sender<MiningStats>,
}

impl StatsAggregator {
    pub fn new() -> (Self, watch::Receiver<MiningStats>) {
        let (snapshot, rx) = watch::channel(MiningStats::new());
        let aggregator = StatsAggregator {
            stats: MiningStats::new(),
            epoch: 0,
            rates: Vec::new(),
            snapshot,
        };
        (aggregator, rx)
    }

    /// Current state, including events not yet published.
    pub fn stats(&self) -> &MiningStats {
        &self.stats
    }

    /// Apply events until every sender is dropped.
    ///
    /// Bursts are drained before publishing so observers see one update per
    /// batch rather than one per event.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<StatsEvent>) {
        while let Some(event) = events.recv().await {
            self.apply(event);
            while let Ok(event) = events.try_recv() {
                self.apply(event);
            }
            self.publish();
        }
    }

    pub fn apply(&mut self, event: StatsEvent) {
        match event {
            StatsEvent::Started { start_time } => {
                self.stats.is_running = true;
                self.stats.start_time = Some(start_time);
            }
            StatsEvent::EpochStarted {
                epoch,
                threads,
                height,
                difficulty,
                transactions,
                total_fees,
            } => {
                self.epoch = epoch;
                self.rates = vec![0.0; threads];
                self.stats.hash_rate = 0.0;
                self.stats.target_difficulty = difficulty;
                self.stats.current_block = Some(height);
                self.stats.transactions_in_block = transactions;
                self.stats.total_fees = total_fees;
            }
            StatsEvent::Progress {
                epoch,
                worker,
                hashes,
                attempts,
                best_match_bits,
                elapsed,
            } => {
                self.stats.total_hashes += hashes;
                self.stats.attempts += attempts;
                self.stats.best_match_bits = self.stats.best_match_bits.max(best_match_bits);

                // Late reports from a retired epoch still count as work done,
                // but their rate no longer describes the running workers.
                if epoch == self.epoch && worker < self.rates.len() {
                    self.blend_rate(worker, hashes, elapsed);
                }
            }
            StatsEvent::BlockFound { hash, .. } => {
                self.stats.blocks_found += 1;
                self.stats.last_block_hash = Some(hash);
            }
            StatsEvent::WorkerExited { epoch, worker } => {
                if epoch == self.epoch && worker < self.rates.len() {
                    self.rates[worker] = 0.0;
                    self.stats.hash_rate = self.rates.iter().sum();
                }
            }
            StatsEvent::Stopped => {
                self.stats.is_running = false;
                self.stats.hash_rate = 0.0;
                // Cancelled workers may still flush; keep their rates out.
                self.rates.clear();
            }
        }
    }

    /// Moving average of one worker's rate, weighted by the thread count.
    fn blend_rate(&mut self, worker: usize, hashes: u64, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return;
        }
        let sample = hashes as f64 / seconds;
        let threads = self.rates.len() as f64;

        let slot = &mut self.rates[worker];
        *slot = if *slot == 0.0 {
            sample
        } else {
            (*slot * (threads - 1.0) + sample) / threads
        };

        self.stats.hash_rate = self.rates.iter().sum();
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.stats.clone());
    }
}
