//! The per-thread nonce search loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use miner_core::block::{BLOCK_HEADER_SIZE, NONCE_OFFSET};
use miner_core::{double_sha256, leading_zero_bits, FinalizedTemplate};
use tokio_util::sync::CancellationToken;

use crate::api::BlockPublisher;
use crate::stats::{StatsEvent, StatsSender};
use crate::tracing::prelude::*;

/// Hash attempts between checks of the report clock.
const CLOCK_CHECK_INTERVAL: u64 = 1_024;

/// Nonce source shared by every worker of one epoch.
///
/// Each value is handed out exactly once. The counter is never rewound; a new
/// epoch gets a new counter.
#[derive(Debug, Default)]
pub struct NonceCounter(AtomicU64);

impl NonceCounter {
    pub fn new() -> Self {
        NonceCounter(AtomicU64::new(0))
    }

    #[cfg(test)]
    pub(crate) fn starting_at(value: u64) -> Self {
        NonceCounter(AtomicU64::new(value))
    }

    /// Claim the next nonce, or `None` once the 32-bit space is used up.
    #[inline]
    pub fn next(&self) -> Option<u32> {
        u32::try_from(self.0.fetch_add(1, Ordering::Relaxed)).ok()
    }
}

/// Why a worker loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Cancelled,
    Solved { nonce: u32, hash: [u8; 32] },
    Exhausted,
}

/// One search loop bound to a single epoch's template and counter.
pub struct Worker {
    pub id: usize,
    pub epoch: u64,
    pub template: Arc<FinalizedTemplate>,
    pub nonces: Arc<NonceCounter>,
    pub cancel: CancellationToken,
    pub stats: StatsSender,
    pub publisher: Arc<dyn BlockPublisher>,
    pub report_interval: Duration,
    pub yield_interval: u64,
}

/// Counters accumulated between two reports.
#[derive(Debug)]
struct LocalCounters {
    hashes: u64,
    attempts: u64,
    best_match_bits: u32,
    since: Instant,
}

impl LocalCounters {
    fn new() -> Self {
        LocalCounters {
            hashes: 0,
            attempts: 0,
            best_match_bits: 0,
            since: Instant::now(),
        }
    }
}

impl Worker {
    /// Run the worker on a named OS thread.
    ///
    /// A panic inside the loop is caught and logged; it ends this worker only.
    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        let name = format!("miner-e{}-w{}", self.epoch, self.id);
        thread::Builder::new().name(name).spawn(move || {
            let (epoch, worker) = (self.epoch, self.id);
            match panic::catch_unwind(AssertUnwindSafe(|| self.run())) {
                Ok(exit) => debug!(epoch, worker, ?exit, "Worker exited"),
                Err(_) => error!(epoch, worker, "Worker panicked; siblings keep mining"),
            }
        })
    }

    /// Search until cancelled, solved, or out of nonces.
    pub fn run(self) -> WorkerExit {
        let target = self.template.target;

        let mut header = [0u8; BLOCK_HEADER_SIZE];
        header[..NONCE_OFFSET].copy_from_slice(&self.template.header.serialize_without_nonce());

        let mut local = LocalCounters::new();
        let mut since_yield = 0u64;

        trace!(epoch = self.epoch, worker = self.id, "Worker started");

        loop {
            if self.cancel.is_cancelled() {
                self.report(&mut local);
                return WorkerExit::Cancelled;
            }

            let Some(nonce) = self.nonces.next() else {
                self.report(&mut local);
                self.exited();
                info!(epoch = self.epoch, worker = self.id, "Nonce space exhausted");
                return WorkerExit::Exhausted;
            };

            header[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
            let hash = double_sha256(&header);
            local.hashes += 1;
            local.attempts += 1;
            local.best_match_bits = local.best_match_bits.max(leading_zero_bits(&hash));

            if target.is_met_by(&hash) {
                self.report(&mut local);
                self.solved(nonce, &hash);
                return WorkerExit::Solved { nonce, hash };
            }

            since_yield += 1;
            if since_yield >= self.yield_interval {
                since_yield = 0;
                thread::yield_now();
            }

            if local.attempts % CLOCK_CHECK_INTERVAL == 0
                && local.since.elapsed() >= self.report_interval
            {
                self.report(&mut local);
            }
        }
    }

    fn solved(&self, nonce: u32, hash: &[u8; 32]) {
        let hash_hex = hex::encode(hash);
        info!(
            epoch = self.epoch,
            worker = self.id,
            nonce,
            height = self.template.template.height,
            hash = %hash_hex,
            "Block found"
        );

        let _ = self.stats.send(StatsEvent::BlockFound {
            epoch: self.epoch,
            worker: self.id,
            hash: hash_hex,
        });
        self.exited();

        self.publisher
            .publish(&self.template.solved(nonce), &self.template.transactions);
    }

    fn exited(&self) {
        let _ = self.stats.send(StatsEvent::WorkerExited {
            epoch: self.epoch,
            worker: self.id,
        });
    }

    /// Send the local counters as a delta and start a new interval.
    fn report(&self, local: &mut LocalCounters) {
        if local.attempts > 0 {
            let _ = self.stats.send(StatsEvent::Progress {
                epoch: self.epoch,
                worker: self.id,
                hashes: local.hashes,
                attempts: local.attempts,
                best_match_bits: local.best_match_bits,
                elapsed: local.since.elapsed(),
            });
        }
        *local = LocalCounters::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChannelPublisher;
    use miner_core::{BlockHeader, BlockTemplate, Target, Transaction};
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    const ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    fn finalized(difficulty: f64) -> Arc<FinalizedTemplate> {
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
        Arc::new(FinalizedTemplate::assemble(template, &[], ADDRESS).unwrap())
    }

    fn worker(
        template: Arc<FinalizedTemplate>,
        nonces: Arc<NonceCounter>,
        publisher: Arc<dyn BlockPublisher>,
    ) -> (Worker, mpsc::UnboundedReceiver<StatsEvent>) {
        let (stats, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            id: 0,
            epoch: 1,
            template,
            nonces,
            cancel: CancellationToken::new(),
            stats,
            publisher,
            report_interval: Duration::from_secs(1),
            yield_interval: 10_000,
        };
        (worker, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StatsEvent>) -> Vec<StatsEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn counted_hashes(events: &[StatsEvent]) -> u64 {
        events
            .iter()
            .map(|event| match event {
                StatsEvent::Progress { hashes, .. } => *hashes,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn test_nonces_are_unique_across_threads() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 20_000;

        let counter = Arc::new(NonceCounter::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| counter.next().unwrap())
                        .collect::<Vec<u32>>()
                })
            })
            .collect();

        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        let distinct: HashSet<u32> = all.iter().copied().collect();
        assert_eq!(distinct.len(), THREADS * PER_THREAD);

        all.sort_unstable();
        let expected: Vec<u32> = (0..(THREADS * PER_THREAD) as u32).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_counter_stops_at_u32_max() {
        let counter = NonceCounter::starting_at(u32::MAX as u64);
        assert_eq!(counter.next(), Some(u32::MAX));
        assert_eq!(counter.next(), None);
        assert_eq!(counter.next(), None);
    }

    #[test]
    fn test_reports_first_qualifying_nonce() {
        // 2^(256 - 8): about one hash in 256 qualifies.
        let template = finalized(8.0);
        assert_eq!(template.template.merkle_root, template.transactions[0].id);

        let expected = (0u32..1_000_000)
            .find(|nonce| template.target.is_met_by(&double_sha256(&template.header_bytes(*nonce))))
            .unwrap();

        let (publisher, mut blocks) = ChannelPublisher::new();
        let (worker, mut stats) = worker(
            template.clone(),
            Arc::new(NonceCounter::new()),
            Arc::new(publisher),
        );

        let WorkerExit::Solved { nonce, hash } = worker.run() else {
            panic!("worker did not solve an easy target");
        };
        assert_eq!(nonce, expected);
        for earlier in 0..nonce {
            let earlier_hash = double_sha256(&template.header_bytes(earlier));
            assert!(!template.target.is_met_by(&earlier_hash));
        }

        let block = blocks.try_recv().unwrap();
        assert_eq!(block.template.nonce, Some(expected));
        assert_eq!(block.transactions, template.transactions);
        let header = BlockHeader::from_template(&block.template).unwrap();
        assert_eq!(header.hash(), hash);

        let events = drain(&mut stats);
        assert_eq!(counted_hashes(&events), expected as u64 + 1);
        assert!(events.iter().any(|event| matches!(
            event,
            StatsEvent::BlockFound { hash: found, .. } if *found == hex::encode(hash)
        )));
        assert!(matches!(
            events.last(),
            Some(StatsEvent::WorkerExited { epoch: 1, worker: 0 })
        ));
    }

    #[test]
    fn test_cancelled_worker_returns_immediately() {
        let (publisher, _blocks) = ChannelPublisher::new();
        let nonces = Arc::new(NonceCounter::new());
        let (worker, mut stats) = worker(finalized(1e14), nonces.clone(), Arc::new(publisher));
        worker.cancel.cancel();

        assert_eq!(worker.run(), WorkerExit::Cancelled);
        assert!(drain(&mut stats).is_empty());
        assert_eq!(nonces.next(), Some(0));
    }

    #[test]
    fn test_exhausted_nonce_space() {
        let (publisher, _blocks) = ChannelPublisher::new();
        let nonces = Arc::new(NonceCounter::starting_at(u32::MAX as u64 - 2));
        let (worker, mut stats) = worker(finalized(1e14), nonces, Arc::new(publisher));

        assert_eq!(worker.run(), WorkerExit::Exhausted);
        let events = drain(&mut stats);
        assert_eq!(counted_hashes(&events), 3);
        assert!(matches!(
            events.last(),
            Some(StatsEvent::WorkerExited { epoch: 1, worker: 0 })
        ));
    }

    #[test]
    fn test_cancel_stops_spawned_worker() {
        let (publisher, _blocks) = ChannelPublisher::new();
        let (worker, mut stats) = worker(
            finalized(1e14),
            Arc::new(NonceCounter::new()),
            Arc::new(publisher),
        );
        let cancel = worker.cancel.clone();

        let handle = worker.spawn().unwrap();
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
        handle.join().unwrap();

        // Final counters are flushed on exit.
        let events = drain(&mut stats);
        assert!(counted_hashes(&events) > 0);
        assert!(!events
            .iter()
            .any(|event| matches!(event, StatsEvent::WorkerExited { .. })));
    }

    struct PanickingPublisher;

    impl BlockPublisher for PanickingPublisher {
        fn publish(&self, _: &BlockTemplate, _: &[Transaction]) {
            panic!("publisher failure");
        }
    }

    #[test]
    fn test_worker_panic_is_contained() {
        let nonces = Arc::new(NonceCounter::new());
        let (worker, mut stats) = worker(finalized(0.0), nonces.clone(), Arc::new(PanickingPublisher));
        assert_eq!(worker.template.target, Target::Unbounded);

        // The thread itself exits cleanly.
        worker.spawn().unwrap().join().unwrap();

        // The shared counter is still usable by siblings.
        assert_eq!(nonces.next(), Some(1));

        // The exit was reported before the publisher ran.
        assert!(drain(&mut stats)
            .iter()
            .any(|event| matches!(event, StatsEvent::WorkerExited { .. })));
    }
}
