//! Write Coalescer
//!
//! Sessions hand progress patches to a background writer instead of writing
//! the store on every event. Patches for the same user inside one flush
//! window merge into a single store write.
//!
//! Flushes happen on the timer, when `max_batch` users are pending, on
//! `flush()` and on `shutdown()`. A failed write stays queued and is retried
//! on the next flush; after `max_retries` retries it is dropped and logged.
//! The in-memory snapshot of the session is never touched by any of this.

use crate::config::PersistenceConfig;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use pitch_shared::store::validate_user_id;
use pitch_shared::{ProgressPatch, ProgressStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Coalescer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerSettings {
    pub flush_interval: Duration,
    pub max_batch: usize,
    pub queue_capacity: usize,
    pub max_retries: u32,
}

impl Default for CoalescerSettings {
    fn default() -> Self {
        Self::from(&PersistenceConfig::default())
    }
}

impl From<&PersistenceConfig> for CoalescerSettings {
    fn from(config: &PersistenceConfig) -> Self {
        Self {
            flush_interval: config.flush_interval(),
            max_batch: config.max_batch.max(1),
            queue_capacity: config.queue_capacity.max(1),
            max_retries: config.max_retries,
        }
    }
}

/// What one flush did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Users whose patch reached the store
    pub written: usize,
    /// Failed writes kept for the next flush
    pub retrying: usize,
    /// Failed writes given up on
    pub dropped: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.written += other.written;
        self.retrying = other.retrying;
        self.dropped += other.dropped;
    }
}

enum Command {
    Write {
        user_id: String,
        patch: ProgressPatch,
        at: DateTime<Utc>,
    },
    Flush(oneshot::Sender<FlushReport>),
    Shutdown(oneshot::Sender<FlushReport>),
}

/// Handle to the background writer. Cheap to clone.
#[derive(Clone)]
pub struct WriteCoalescer {
    tx: mpsc::Sender<Command>,
}

impl WriteCoalescer {
    /// Start the writer task
    pub fn spawn(store: Arc<dyn ProgressStore>, settings: CoalescerSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let writer = Writer {
            store,
            settings,
            pending: BTreeMap::new(),
        };
        let handle = tokio::spawn(writer.run(rx));
        (Self { tx }, handle)
    }

    /// Queue a patch. Waits when the queue is full.
    pub async fn submit(&self, user_id: &str, patch: ProgressPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        validate_user_id(user_id)?;

        self.tx
            .send(Command::Write {
                user_id: user_id.to_string(),
                patch,
                at: Utc::now(),
            })
            .await
            .map_err(|_| anyhow!("write coalescer has stopped"))
    }

    /// Write everything pending now
    pub async fn flush(&self) -> Result<FlushReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .await
            .map_err(|_| anyhow!("write coalescer has stopped"))?;
        rx.await.map_err(|_| anyhow!("write coalescer stopped during flush"))
    }

    /// Flush until nothing is left to retry, then stop the writer
    pub async fn shutdown(&self) -> Result<FlushReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(reply))
            .await
            .map_err(|_| anyhow!("write coalescer has stopped"))?;
        rx.await.map_err(|_| anyhow!("write coalescer stopped during shutdown"))
    }
}

struct PendingWrite {
    patch: ProgressPatch,
    at: DateTime<Utc>,
    failures: u32,
}

struct Writer {
    store: Arc<dyn ProgressStore>,
    settings: CoalescerSettings,
    pending: BTreeMap<String, PendingWrite>,
}

impl Writer {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut ticker = tokio::time::interval(self.settings.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        debug!(
            "Write coalescer started (window {:?}, batch {})",
            self.settings.flush_interval, self.settings.max_batch
        );

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Write { user_id, patch, at }) => {
                        self.queue(user_id, patch, at);
                        if self.pending.len() >= self.settings.max_batch {
                            self.flush().await;
                        }
                    }
                    Some(Command::Flush(reply)) => {
                        let report = self.flush().await;
                        let _ = reply.send(report);
                    }
                    Some(Command::Shutdown(reply)) => {
                        let report = self.drain().await;
                        let _ = reply.send(report);
                        break;
                    }
                    None => {
                        self.drain().await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if !self.pending.is_empty() {
                        self.flush().await;
                    }
                }
            }
        }

        info!("Write coalescer stopped");
    }

    fn queue(&mut self, user_id: String, patch: ProgressPatch, at: DateTime<Utc>) {
        match self.pending.get_mut(&user_id) {
            Some(existing) => {
                existing.patch.merge(patch);
                existing.at = at;
            }
            None => {
                self.pending.insert(
                    user_id,
                    PendingWrite {
                        patch,
                        at,
                        failures: 0,
                    },
                );
            }
        }
    }

    async fn flush(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        if self.pending.is_empty() {
            return report;
        }

        let batch = std::mem::take(&mut self.pending);
        let store = Arc::clone(&self.store);
        let count = batch.len();

        let results = match tokio::task::spawn_blocking(move || {
            batch
                .into_iter()
                .map(|(user_id, write)| {
                    let result = store.merge(&user_id, &write.patch, write.at).map(|_| ());
                    (user_id, write, result)
                })
                .collect::<Vec<_>>()
        })
        .await
        {
            Ok(results) => results,
            Err(e) => {
                error!("Store writer task failed, {} pending writes lost: {}", count, e);
                report.dropped = count;
                return report;
            }
        };

        for (user_id, mut write, result) in results {
            match result {
                Ok(()) => report.written += 1,
                Err(e) => {
                    write.failures += 1;
                    if write.failures > self.settings.max_retries {
                        error!(
                            "Dropping progress write for {} after {} attempts: {}",
                            user_id, write.failures, e
                        );
                        report.dropped += 1;
                    } else {
                        warn!(
                            "Progress write for {} failed (attempt {}), will retry: {}",
                            user_id, write.failures, e
                        );
                        report.retrying += 1;
                        self.requeue(user_id, write);
                    }
                }
            }
        }

        debug!(
            "Flushed {} users: {} written, {} retrying, {} dropped",
            count, report.written, report.retrying, report.dropped
        );
        report
    }

    /// Put a failed write back, folding in anything newer for the same user
    fn requeue(&mut self, user_id: String, mut write: PendingWrite) {
        if let Some(newer) = self.pending.remove(&user_id) {
            write.patch.merge(newer.patch);
            write.at = newer.at;
        }
        self.pending.insert(user_id, write);
    }

    async fn drain(&mut self) -> FlushReport {
        let mut total = FlushReport::default();
        while !self.pending.is_empty() {
            total.absorb(self.flush().await);
        }
        total
    }
}
