//! Write coalescer integration tests
//!
//! Covers coalescing per user, batch and timer flushes, flush on shutdown
//! and the retry/drop policy for failing stores.

use chrono::{DateTime, Utc};
use pitch_shared::error::Result as PitchResult;
use pitch_shared::{
    MemoryProgressStore, PitchError, ProgressPatch, ProgressRecord, ProgressStore,
};
use pitchctl::{CoalescerSettings, FlushReport, WriteCoalescer};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Memory store that counts merges and can fail the next N of them
#[derive(Default)]
struct CountingStore {
    inner: MemoryProgressStore,
    merges: AtomicU32,
    fail_next: AtomicU32,
}

impl CountingStore {
    fn failing(times: u32) -> Self {
        let store = Self::default();
        store.fail_next.store(times, Ordering::SeqCst);
        store
    }

    fn merges(&self) -> u32 {
        self.merges.load(Ordering::SeqCst)
    }
}

impl ProgressStore for CountingStore {
    fn load(&self, user_id: &str) -> PitchResult<Option<ProgressRecord>> {
        self.inner.load(user_id)
    }

    fn merge(&self, user_id: &str, patch: &ProgressPatch, at: DateTime<Utc>) -> PitchResult<ProgressRecord> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(PitchError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk unavailable",
            )));
        }
        self.merges.fetch_add(1, Ordering::SeqCst);
        self.inner.merge(user_id, patch, at)
    }
}

fn settings(max_batch: usize, max_retries: u32) -> CoalescerSettings {
    CoalescerSettings {
        flush_interval: Duration::from_secs(3600),
        max_batch,
        queue_capacity: 16,
        max_retries,
    }
}

fn xp_patch(xp: u64) -> ProgressPatch {
    ProgressPatch {
        xp: Some(xp),
        ..ProgressPatch::default()
    }
}

fn stored_xp(store: &CountingStore, user: &str) -> Option<u64> {
    store.load(user).unwrap().map(|r| r.xp)
}

#[tokio::test]
async fn test_patches_for_one_user_coalesce() {
    let store = Arc::new(CountingStore::default());
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), settings(100, 3));

    for xp in [25, 50, 75] {
        coalescer.submit("rep-1", xp_patch(xp)).await.unwrap();
    }
    let report = coalescer.flush().await.unwrap();

    assert_eq!(report.written, 1);
    assert_eq!(store.merges(), 1);
    assert_eq!(stored_xp(&store, "rep-1"), Some(75));

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn test_empty_patch_is_not_queued() {
    let store = Arc::new(CountingStore::default());
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), settings(100, 3));

    coalescer.submit("rep-1", ProgressPatch::default()).await.unwrap();
    assert_eq!(coalescer.flush().await.unwrap(), FlushReport::default());
    assert_eq!(store.merges(), 0);

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn test_invalid_user_rejected_at_submit() {
    let store = Arc::new(CountingStore::default());
    let (coalescer, writer) = WriteCoalescer::spawn(store, settings(100, 3));

    assert!(coalescer.submit("../etc/passwd", xp_patch(1)).await.is_err());

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn test_batch_size_triggers_flush() {
    let store = Arc::new(CountingStore::default());
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), settings(2, 3));

    coalescer.submit("rep-1", xp_patch(10)).await.unwrap();
    coalescer.submit("rep-2", xp_patch(20)).await.unwrap();

    // Commands are handled in order, so the batch flush has already run
    let report = coalescer.flush().await.unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(store.merges(), 2);
    assert_eq!(stored_xp(&store, "rep-2"), Some(20));

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn test_timer_flushes_pending_writes() {
    let store = Arc::new(CountingStore::default());
    let quick = CoalescerSettings {
        flush_interval: Duration::from_millis(20),
        ..settings(100, 3)
    };
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), quick);

    coalescer.submit("rep-1", xp_patch(40)).await.unwrap();

    let mut waited = 0;
    while store.merges() == 0 && waited < 100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += 1;
    }
    assert_eq!(stored_xp(&store, "rep-1"), Some(40));

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_flushes_everything() {
    let store = Arc::new(CountingStore::default());
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), settings(100, 3));

    coalescer.submit("rep-1", xp_patch(10)).await.unwrap();
    coalescer.submit("rep-2", xp_patch(20)).await.unwrap();
    let report = coalescer.shutdown().await.unwrap();
    writer.await.unwrap();

    assert_eq!(report.written, 2);
    assert_eq!(stored_xp(&store, "rep-1"), Some(10));
    assert_eq!(stored_xp(&store, "rep-2"), Some(20));

    // Writer is gone
    assert!(coalescer.submit("rep-1", xp_patch(30)).await.is_err());
}

#[tokio::test]
async fn test_failed_write_retried_on_next_flush() {
    let store = Arc::new(CountingStore::failing(2));
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), settings(100, 3));

    coalescer.submit("rep-1", xp_patch(10)).await.unwrap();
    let first = coalescer.flush().await.unwrap();
    assert_eq!(first.retrying, 1);
    assert_eq!(stored_xp(&store, "rep-1"), None);

    // A newer patch folds into the retried one
    coalescer.submit("rep-1", xp_patch(35)).await.unwrap();
    let second = coalescer.flush().await.unwrap();
    assert_eq!(second.retrying, 1);

    let third = coalescer.flush().await.unwrap();
    assert_eq!(third.written, 1);
    assert_eq!(store.merges(), 1);
    assert_eq!(stored_xp(&store, "rep-1"), Some(35));

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn test_write_dropped_after_retry_limit() {
    let store = Arc::new(CountingStore::failing(u32::MAX));
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), settings(100, 1));

    coalescer.submit("rep-1", xp_patch(10)).await.unwrap();
    assert_eq!(coalescer.flush().await.unwrap().retrying, 1);
    assert_eq!(coalescer.flush().await.unwrap().dropped, 1);
    assert_eq!(coalescer.flush().await.unwrap(), FlushReport::default());

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
    assert_eq!(store.merges(), 0);
}

#[tokio::test]
async fn test_shutdown_gives_up_on_failing_store() {
    let store = Arc::new(CountingStore::failing(u32::MAX));
    let (coalescer, writer) = WriteCoalescer::spawn(store, settings(100, 2));

    coalescer.submit("rep-1", xp_patch(10)).await.unwrap();
    let report = coalescer.shutdown().await.unwrap();
    writer.await.unwrap();

    assert_eq!(report.written, 0);
    assert_eq!(report.dropped, 1);
}
