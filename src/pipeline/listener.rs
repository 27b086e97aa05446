//! Throttled job listener - drains the job queue into the credential API
//!
//! Each tick takes at most `batch_size` jobs, dispatches them concurrently and
//! waits for every one of them to settle before pacing `latency` and taking
//! the next batch. So at most `batch_size` writes are ever in flight. An idle
//! listener parks on the queue's notifier instead of polling.
//!
//! A failed write is logged with its payload and dropped. The next scheduled
//! run recomputes the desired state and re-derives it.

use super::collaborators::CredentialWriter;
use super::queue::{Drained, JobQueue};
use super::types::Job;
use crate::error::{error_chain, Error, Result};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Write outcomes over the lifetime of one listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a running listener
///
/// `stop` needs a [`Drained`] token, so queued jobs cannot be dropped by
/// accident. `wait_drained` hands one out, or an error once the listener task
/// is gone. `abandon` is the explicit way out on the error path. Dropping
/// the handle ends the loop after the current batch.
pub struct ListenerHandle {
    queue: Arc<JobQueue<Job>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl ListenerHandle {
    /// Stop after the queue drained. Waits for the in-flight batch to settle.
    pub async fn stop(self, _drained: Drained) -> ListenerStats {
        self.shutdown_and_join().await
    }

    /// Stop without draining; whatever is still queued is discarded.
    pub async fn abandon(self) -> ListenerStats {
        let remaining = self.queue.len();
        if remaining > 0 {
            log::warn!(
                "⚠️  Abandoning job listener on '{}' with {} queued jobs",
                self.queue.name(),
                remaining
            );
        }
        self.shutdown_and_join().await
    }

    /// Wait for the queue to drain, failing if the listener task ends first
    /// (a panicking writer). Without a live listener the queue never drains.
    pub async fn wait_drained(&self, poll_interval: Duration) -> Result<Drained> {
        tokio::select! {
            biased;
            drained = self.queue.wait(poll_interval) => Ok(drained),
            _ = self.exited(poll_interval) => Err(Error::ListenerExited(self.queue.len())),
        }
    }

    async fn exited(&self, poll_interval: Duration) {
        while !self.task.is_finished() {
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn shutdown_and_join(self) -> ListenerStats {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            log::error!("❌ Job listener task failed: {}", e);
        }
        let stats = self.counters.snapshot();
        log::info!(
            "🛑 Job listener stopped ({} written, {} failed)",
            stats.succeeded,
            stats.failed
        );
        stats
    }
}

/// Spawn the listener loop on the current tokio runtime.
pub fn start_job_listener(
    queue: Arc<JobQueue<Job>>,
    writer: Arc<dyn CredentialWriter>,
    latency: Duration,
    batch_size: usize,
) -> ListenerHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let counters = Arc::new(Counters::default());

    let task = tokio::spawn(listener_loop(
        queue.clone(),
        writer,
        latency,
        batch_size.max(1),
        shutdown_rx,
        counters.clone(),
    ));

    ListenerHandle {
        queue,
        shutdown,
        task,
        counters,
    }
}

async fn listener_loop(
    queue: Arc<JobQueue<Job>>,
    writer: Arc<dyn CredentialWriter>,
    latency: Duration,
    batch_size: usize,
    mut shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
) {
    log::info!(
        "👂 Job listener started on '{}' (batch: {}, latency: {}ms)",
        queue.name(),
        batch_size,
        latency.as_millis()
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        let jobs = queue.pop_jobs(batch_size);

        if jobs.is_empty() {
            tokio::select! {
                _ = queue.job_added() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        let stats = dispatch_batch(writer.as_ref(), &jobs).await;
        counters.succeeded.fetch_add(stats.succeeded, Ordering::Relaxed);
        counters.failed.fetch_add(stats.failed, Ordering::Relaxed);

        tokio::select! {
            _ = tokio::time::sleep(latency) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}

async fn dispatch(writer: &dyn CredentialWriter, job: &Job) -> Result<String> {
    match job {
        Job::Add(spec) => writer.issue(spec).await,
        Job::Update(spec) => writer.update(spec).await,
    }
}

/// Dispatch every job at once and wait for all of them to settle.
pub async fn dispatch_batch(writer: &dyn CredentialWriter, jobs: &[Job]) -> ListenerStats {
    let results = join_all(jobs.iter().map(|job| dispatch(writer, job))).await;

    let mut stats = ListenerStats::default();
    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(id) => {
                stats.succeeded += 1;
                log::info!("✅ Credential {} written", id);
                log::debug!("   └─ job: {}", job.describe());
            }
            Err(e) => {
                stats.failed += 1;
                log::error!(
                    "❌ Credential write failed: {} | job: {}",
                    error_chain(&e),
                    job.describe()
                );
            }
        }
    }
    stats
}
