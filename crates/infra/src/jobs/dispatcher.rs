//! Bounded-concurrency dispatcher over a [`JobQueue`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use padmigrate_core::Job;
use padmigrate_migration::{ImportSummary, MigrationError};

use super::store::{ClaimedJob, JobQueue, QueueError};

/// Runs one job to completion.
pub type JobHandler = Arc<dyn Fn(&Job) -> Result<ImportSummary, MigrationError> + Send + Sync>;

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Name for logging; also the prefix of worker thread names
    pub name: String,
    /// Maximum jobs running at once
    pub max_concurrent: usize,
    /// Longest single wait on the queue or for a free slot
    pub block_timeout: Duration,
    /// Pause after a queue error before trying again
    pub retry_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "padmigrate-dispatcher".to_string(),
            max_concurrent: 4,
            block_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl DispatcherConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }
}

/// Handle to control a running dispatcher.
#[derive(Debug)]
pub struct JobDispatcherHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<DispatcherStats>>,
}

impl JobDispatcherHandle {
    /// Stop claiming new jobs and wait for in-flight ones to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Get current dispatcher statistics.
    pub fn stats(&self) -> DispatcherStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Dispatcher runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DispatcherStats {
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_rejected: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

/// Pulls jobs from the queue and runs each on its own thread, never more
/// than `max_concurrent` at a time.
pub struct JobDispatcher {
    queue: Arc<dyn JobQueue>,
    handler: JobHandler,
}

impl JobDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>, handler: JobHandler) -> Self {
        Self { queue, handler }
    }

    /// Run the dispatch loop on the calling thread. Never returns.
    pub fn run(self, config: DispatcherConfig) {
        let (_keep_open, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(DispatcherStats::default()));
        dispatch_loop(self, config, shutdown_rx, stats);
    }

    /// Spawn the dispatcher in a background thread.
    pub fn spawn(self, config: DispatcherConfig) -> JobDispatcherHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(DispatcherStats::default()));
        let stats_clone = stats.clone();

        let name = config.name.clone();
        let join = thread::Builder::new()
            .name(name)
            .spawn(move || {
                dispatch_loop(self, config, shutdown_rx, stats_clone);
            })
            .expect("failed to spawn dispatcher thread");

        JobDispatcherHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }
}

/// Returns its slot token when the job thread ends, even on panic.
struct SlotGuard {
    slots: SyncSender<()>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let _ = self.slots.try_send(());
    }
}

fn dispatch_loop(
    dispatcher: JobDispatcher,
    config: DispatcherConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<DispatcherStats>>,
) {
    let max_concurrent = config.max_concurrent.max(1);
    info!(dispatcher = %config.name, max_concurrent, "job dispatcher started");
    let start_time = Instant::now();

    // Counting semaphore: one token per free worker slot.
    let (slot_tx, slot_rx) = mpsc::sync_channel::<()>(max_concurrent);
    for _ in 0..max_concurrent {
        let _ = slot_tx.try_send(());
    }

    let mut workers: Vec<thread::JoinHandle<()>> = Vec::new();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        {
            let mut s = stats.lock().unwrap();
            s.uptime_secs = start_time.elapsed().as_secs();
        }
        workers.retain(|w| !w.is_finished());

        let slot = match slot_rx.recv_timeout(config.block_timeout) {
            Ok(()) => SlotGuard {
                slots: slot_tx.clone(),
            },
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match dispatcher.queue.claim_next(config.block_timeout) {
            Ok(Some(claimed)) => {
                debug!(dispatcher = %config.name, job_id = %claimed.job.id(), "claimed job");
                stats.lock().unwrap().current_running += 1;

                match spawn_worker(&dispatcher, &config, claimed, slot, stats.clone()) {
                    Ok(worker) => workers.push(worker),
                    Err(e) => {
                        error!(dispatcher = %config.name, error = %e, "failed to start job thread");
                        let mut s = stats.lock().unwrap();
                        s.current_running = s.current_running.saturating_sub(1);
                        s.jobs_processed += 1;
                        s.jobs_failed += 1;
                    }
                }
            }
            Ok(None) => drop(slot),
            Err(QueueError::Decode { payload, reason }) => {
                warn!(dispatcher = %config.name, %payload, %reason, "undecodable job payload rejected");
                stats.lock().unwrap().jobs_rejected += 1;
            }
            Err(e) => {
                error!(dispatcher = %config.name, error = %e, "failed to claim job");
                drop(slot);
                thread::sleep(config.retry_delay);
            }
        }
    }

    info!(dispatcher = %config.name, in_flight = workers.len(), "job dispatcher draining");
    for worker in workers {
        let _ = worker.join();
    }
    info!(dispatcher = %config.name, "job dispatcher stopped");
}

fn spawn_worker(
    dispatcher: &JobDispatcher,
    config: &DispatcherConfig,
    claimed: ClaimedJob,
    slot: SlotGuard,
    stats: Arc<Mutex<DispatcherStats>>,
) -> std::io::Result<thread::JoinHandle<()>> {
    let queue = dispatcher.queue.clone();
    let handler = dispatcher.handler.clone();
    let name = format!("{}-{}", config.name, claimed.job.id());

    thread::Builder::new().name(name).spawn(move || {
        let _slot = slot;
        let succeeded = execute_job(queue.as_ref(), &handler, &claimed);

        let mut s = stats.lock().unwrap();
        s.current_running = s.current_running.saturating_sub(1);
        s.jobs_processed += 1;
        if succeeded {
            s.jobs_succeeded += 1;
        } else {
            s.jobs_failed += 1;
        }
    })
}

/// Run the handler for one claimed job and settle its queue state.
fn execute_job(queue: &dyn JobQueue, handler: &JobHandler, claimed: &ClaimedJob) -> bool {
    let job_id = claimed.job.id();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&claimed.job)));

    match outcome {
        Ok(Ok(summary)) if summary.processed() > 0 => match queue.complete(claimed) {
            Ok(()) => {
                info!(
                    %job_id,
                    created = summary.created,
                    skipped = summary.skipped,
                    "job completed"
                );
                true
            }
            Err(e) => {
                error!(%job_id, error = %e, "job finished but could not be marked done");
                false
            }
        },
        Ok(Ok(_)) => {
            error!(%job_id, "job processed no files; left in processing");
            false
        }
        Ok(Err(err)) => {
            error!(%job_id, kind = err.kind(), error = %err, "job failed; left in processing");
            false
        }
        Err(_) => {
            error!(%job_id, "job panicked; left in processing");
            false
        }
    }
}
