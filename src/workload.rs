//! Demo workload that produces long locks
//!
//! A manager thread starts a worker every `spawn_interval` (up to
//! `max_workers`) and stops one every `stop_interval`. Workers are assigned
//! round-robin to three instrumented locks and hold them long enough that the
//! other workers on the same lock wait past the threshold.

use crate::instrumented_mutex::InstrumentedMutex;
use crate::monitor::Monitor;
use crossbeam::channel::{self, Receiver, Sender};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Categories of the three demo locks
pub const WORKLOAD_CATEGORIES: [&str; 3] = ["Category-A", "Category-B", "Category-C"];

/// Timing of the demo workload
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Lock wait above which an acquisition is recorded
    pub threshold: Duration,
    pub max_workers: usize,
    /// How often the manager starts a worker
    pub spawn_interval: Duration,
    /// How often the manager stops a worker
    pub stop_interval: Duration,
    /// Upper bound of the random pause before each lock
    pub max_pause: Duration,
    /// Minimum hold time per lock
    pub hold: Duration,
    /// Upper bound of the random extra hold time
    pub max_extra_hold: Duration,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(50),
            max_workers: 5,
            spawn_interval: Duration::from_secs(1),
            stop_interval: Duration::from_secs(3),
            max_pause: Duration::from_millis(100),
            hold: Duration::from_millis(800),
            max_extra_hold: Duration::from_millis(300),
        }
    }
}

/// Running demo workload
///
/// Call [`Workload::stop`] to stop and join all threads.
pub struct Workload {
    stop_tx: Sender<()>,
    manager: Option<JoinHandle<()>>,
}

impl Workload {
    /// Start the manager thread
    pub fn start(monitor: Arc<Monitor>, config: WorkloadConfig) -> Self {
        let locks = WORKLOAD_CATEGORIES.map(|category| {
            let mut lock = InstrumentedMutex::new((), Arc::clone(&monitor), config.threshold);
            lock.set_category(category);
            Arc::new(lock)
        });
        let (stop_tx, stop_rx) = channel::bounded(0);
        let manager = thread::Builder::new()
            .name("lockmon-workload".to_string())
            .spawn(move || run_manager(locks, config, stop_rx))
            .ok();
        if manager.is_none() {
            tracing::warn!("Failed to spawn workload manager thread");
        }
        Self { stop_tx, manager }
    }

    /// Stop the manager and every worker, waiting for them to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the only sender disconnects the manager's stop channel
        let (dead_tx, _) = channel::bounded(0);
        drop(std::mem::replace(&mut self.stop_tx, dead_tx));
        if let Some(manager) = self.manager.take() {
            if manager.join().is_err() {
                tracing::warn!("Workload manager thread panicked");
            }
        }
    }
}

impl Drop for Workload {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

fn run_manager(
    locks: [Arc<InstrumentedMutex<()>>; 3],
    config: WorkloadConfig,
    stop_rx: Receiver<()>,
) {
    let spawn_tick = channel::tick(config.spawn_interval);
    let stop_tick = channel::tick(config.stop_interval);
    let mut workers: BTreeMap<u64, Worker> = BTreeMap::new();
    let mut next_id = 0u64;
    let mut running = true;

    while running {
        channel::select! {
            recv(stop_rx) -> _ => running = false,
            recv(spawn_tick) -> _ => {
                if workers.len() < config.max_workers {
                    next_id += 1;
                    let id = next_id;
                    let lock = Arc::clone(&locks[(id % 3) as usize]);
                    match spawn_worker(id, lock, &config) {
                        Some(worker) => {
                            workers.insert(id, worker);
                            tracing::info!(worker = id, total = workers.len(), "started worker");
                        }
                        None => tracing::warn!(worker = id, "failed to spawn worker"),
                    }
                }
            }
            recv(stop_tick) -> _ => {
                if let Some((id, worker)) = workers.pop_first() {
                    stop_worker(id, worker);
                    tracing::info!(worker = id, total = workers.len(), "stopped worker");
                }
            }
        }
    }

    while let Some((id, worker)) = workers.pop_first() {
        stop_worker(id, worker);
    }
}

fn spawn_worker(id: u64, lock: Arc<InstrumentedMutex<()>>, config: &WorkloadConfig) -> Option<Worker> {
    let (stop_tx, stop_rx) = channel::bounded(0);
    let config = config.clone();
    thread::Builder::new()
        .name(format!("lockmon-worker-{id}"))
        .spawn(move || run_worker(id, &lock, &config, &stop_rx))
        .ok()
        .map(|handle| Worker { stop_tx, handle })
}

fn stop_worker(id: u64, worker: Worker) {
    drop(worker.stop_tx);
    if worker.handle.join().is_err() {
        tracing::warn!(worker = id, "worker thread panicked");
    }
}

fn run_worker(
    id: u64,
    lock: &InstrumentedMutex<()>,
    config: &WorkloadConfig,
    stop_rx: &Receiver<()>,
) {
    let mut rng = rand::thread_rng();
    loop {
        let pause = random_up_to(&mut rng, config.max_pause);
        // Sleeps on the stop channel so a stop request ends the pause early
        if !matches!(
            stop_rx.recv_timeout(pause),
            Err(channel::RecvTimeoutError::Timeout)
        ) {
            break;
        }

        let guard = lock.lock();
        thread::sleep(config.hold + random_up_to(&mut rng, config.max_extra_hold));
        drop(guard);
    }
    tracing::debug!(worker = id, category = lock.category(), "worker exited");
}

fn random_up_to(rng: &mut impl Rng, max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..max_ms))
}
