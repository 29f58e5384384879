//! The mining coordinator: refresh loop, epochs and the worker pool.
//!
//! Every refresh builds a [`FinalizedTemplate`] and, only if that succeeds,
//! retires the running epoch and starts a new one. An epoch owns its template,
//! its nonce counter and the cancellation token of its workers; it is swapped
//! whole and never edited in place.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use miner_core::difficulty::format_difficulty;
use miner_core::FinalizedTemplate;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{BlockPublisher, TemplateProvider};
use crate::config::{ConfigStore, CoordinatorSettings, MiningConfig};
use crate::error::{MinerError, Result};
use crate::state::MiningStats;
use crate::stats::{StatsAggregator, StatsEvent, StatsSender};
use crate::tracing::prelude::*;
use crate::worker::{NonceCounter, Worker};

/// One generation of workers and the template they search.
struct Epoch {
    id: u64,
    template: Arc<FinalizedTemplate>,
    cancel: CancellationToken,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Epoch {
    /// Cancel the workers and wait for their threads to exit.
    async fn retire(self) {
        self.cancel.cancel();
        let id = self.id;
        let workers = self.workers;
        let joined = tokio::task::spawn_blocking(move || {
            workers
                .into_iter()
                .map(thread::JoinHandle::join)
                .filter(|joined| joined.is_err())
                .count()
        })
        .await;
        match joined {
            Ok(0) => debug!(epoch = id, "Epoch retired"),
            Ok(failed) => warn!(epoch = id, failed, "Epoch retired with failed workers"),
            Err(e) => warn!(epoch = id, "Could not join epoch workers: {e}"),
        }
    }
}

struct RefreshLoop {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

#[derive(Default)]
struct CoordinatorState {
    refresh: Option<RefreshLoop>,
    epoch: Option<Epoch>,
}

struct Inner {
    provider: Arc<dyn TemplateProvider>,
    publisher: Arc<dyn BlockPublisher>,
    config_store: Arc<dyn ConfigStore>,
    settings: CoordinatorSettings,
    running: AtomicBool,
    last_epoch: AtomicU64,
    stats: StatsSender,
    snapshot: watch::Receiver<MiningStats>,
    state: Mutex<CoordinatorState>,
}

impl Inner {
    fn report(&self, event: StatsEvent) {
        let _ = self.stats.send(event);
    }
}

/// Drives template refreshes and the worker pool.
///
/// Must be created inside a Tokio runtime. Dropping the coordinator stops
/// mining.
pub struct MiningCoordinator {
    inner: Arc<Inner>,
}

impl MiningCoordinator {
    pub fn new(
        provider: Arc<dyn TemplateProvider>,
        publisher: Arc<dyn BlockPublisher>,
        config_store: Arc<dyn ConfigStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        let (aggregator, snapshot) = StatsAggregator::new();
        let (stats, events) = mpsc::unbounded_channel();
        tokio::spawn(aggregator.run(events));

        MiningCoordinator {
            inner: Arc::new(Inner {
                provider,
                publisher,
                config_store,
                settings,
                running: AtomicBool::new(false),
                last_epoch: AtomicU64::new(0),
                stats,
                snapshot,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    /// Begin the refresh loop. Does nothing if already running.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("Start requested while already running");
            return;
        }

        info!("Mining started");
        self.inner.report(StatsEvent::Started {
            start_time: unix_millis(),
        });

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(refresh_loop(self.inner.clone(), cancel.clone()));
        state.refresh = Some(RefreshLoop {
            cancel,
            _handle: handle,
        });
    }

    /// Cancel the refresh loop and every worker. Safe to call repeatedly.
    ///
    /// Worker threads are not joined; each exits at its next loop check.
    pub fn stop(&self) {
        let epoch = {
            let mut state = self.inner.state.lock();
            if !self.inner.running.swap(false, Ordering::SeqCst) {
                return;
            }
            // Cancelled under the lock so an in-flight refresh cannot
            // install an epoch after this point.
            if let Some(refresh) = state.refresh.take() {
                refresh.cancel.cancel();
            }
            state.epoch.take()
        };

        if let Some(epoch) = epoch {
            epoch.cancel.cancel();
            debug!(epoch = epoch.id, "Workers cancelled");
        }

        self.inner.report(StatsEvent::Stopped);
        info!("Mining stopped");
    }

    /// Persist a new configuration and restart mining if it was running.
    pub async fn update_config(&self, config: MiningConfig) -> Result<()> {
        config.validate()?;
        self.inner.config_store.save(&config)?;
        info!(threads = config.threads, "Configuration updated");

        if self.is_running() {
            self.stop();
            tokio::time::sleep(self.inner.settings.restart_delay).await;
            self.start();
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Latest published statistics.
    pub fn stats(&self) -> MiningStats {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver notified on every statistics update.
    pub fn subscribe(&self) -> watch::Receiver<MiningStats> {
        self.inner.snapshot.clone()
    }

    /// Id of the epoch currently being mined.
    pub fn current_epoch(&self) -> Option<u64> {
        self.inner.state.lock().epoch.as_ref().map(|epoch| epoch.id)
    }

    /// Template of the epoch currently being mined.
    pub fn current_template(&self) -> Option<Arc<FinalizedTemplate>> {
        self.inner
            .state
            .lock()
            .epoch
            .as_ref()
            .map(|epoch| epoch.template.clone())
    }
}

impl Drop for MiningCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    trace!("Refresh loop started");

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = refresh(&inner, &cancel) => outcome,
        };

        let delay = match outcome {
            Ok(()) => inner.settings.refresh_interval,
            Err(MinerError::Template(e)) => {
                warn!("Template rejected, keeping current epoch: {e}");
                inner.settings.retry_backoff
            }
            Err(MinerError::Fetch(e)) => {
                warn!(
                    "Template fetch failed, retrying in {:?}: {e:#}",
                    inner.settings.retry_backoff
                );
                inner.settings.retry_backoff
            }
            Err(e) => {
                warn!(
                    "Refresh failed, retrying in {:?}: {e}",
                    inner.settings.retry_backoff
                );
                inner.settings.retry_backoff
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    trace!("Refresh loop stopped");
}

/// One refresh cycle: fetch, assemble, then swap epochs.
async fn refresh(inner: &Inner, cancel: &CancellationToken) -> Result<()> {
    let config = inner.config_store.load()?;
    config.validate()?;

    let template = inner
        .provider
        .fetch_template()
        .await
        .map_err(MinerError::Fetch)?;
    let mempool = inner
        .provider
        .fetch_transactions()
        .await
        .map_err(MinerError::Fetch)?;

    let finalized = Arc::new(FinalizedTemplate::assemble(
        template,
        &mempool,
        &config.address,
    )?);

    let previous = {
        let mut state = inner.state.lock();
        if cancel.is_cancelled() {
            return Ok(());
        }
        state.epoch.take()
    };
    if let Some(previous) = previous {
        previous.retire().await;
    }
    // stop() may have run while the old workers were being joined.
    if cancel.is_cancelled() {
        return Ok(());
    }

    let epoch = start_epoch(inner, finalized, config.threads);

    let mut state = inner.state.lock();
    if cancel.is_cancelled() {
        epoch.cancel.cancel();
        return Ok(());
    }
    state.epoch = Some(epoch);
    Ok(())
}

/// Spawn `threads` workers on a fresh nonce counter.
fn start_epoch(inner: &Inner, template: Arc<FinalizedTemplate>, threads: usize) -> Epoch {
    let id = inner.last_epoch.fetch_add(1, Ordering::SeqCst) + 1;
    let nonces = Arc::new(NonceCounter::new());
    let cancel = CancellationToken::new();

    inner.report(StatsEvent::EpochStarted {
        epoch: id,
        threads,
        height: template.template.height,
        difficulty: template.template.difficulty,
        transactions: template.transactions.len(),
        total_fees: template.total_fees,
    });

    info!(
        epoch = id,
        height = template.template.height,
        transactions = template.transactions.len(),
        difficulty = %format_difficulty(template.template.difficulty),
        pow_target = %template.target,
        threads,
        "Starting epoch"
    );
    if template.target.is_unreachable() {
        warn!(epoch = id, "Target is zero; no hash can solve this template");
    }

    let mut workers = Vec::with_capacity(threads);
    for worker_id in 0..threads {
        let worker = Worker {
            id: worker_id,
            epoch: id,
            template: template.clone(),
            nonces: nonces.clone(),
            cancel: cancel.clone(),
            stats: inner.stats.clone(),
            publisher: inner.publisher.clone(),
            report_interval: inner.settings.report_interval,
            yield_interval: inner.settings.yield_interval,
        };
        match worker.spawn() {
            Ok(handle) => workers.push(handle),
            Err(e) => error!(epoch = id, worker = worker_id, "Failed to spawn worker: {e}"),
        }
    }

    Epoch {
        id,
        template,
        cancel,
        workers,
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
