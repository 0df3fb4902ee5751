//! Report Outbox
//!
//! A report is never lost because the store was briefly unreachable.
//! `ReportPersister` tries a bounded number of times; what still fails is
//! parked in the outbox and re-sent by `spawn_flush_loop`.
//! The outbox holds at most one pending report per (exam, candidate); a newer
//! report for the same pair replaces the queued one.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::store::{ReportStore, StoreError};
use super::types::ProctoringReport;
use crate::logic::error::{ProctorError, ProctorResult};
use crate::logic::telemetry::{self, ProctorEvent};

/// Delay before the second attempt; doubles after each failure
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

// ============================================================================
// OUTBOX
// ============================================================================

#[derive(Default)]
pub struct ReportOutbox {
    pending: Mutex<VecDeque<ProctoringReport>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub persisted: usize,
    pub requeued: usize,
    pub dropped: usize,
}

impl ReportOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, report: ProctoringReport) {
        let key = report.key();
        let mut pending = self.pending.lock();
        pending.retain(|r| r.key() != key);
        pending.push_back(report);
        log::debug!("Report {} queued ({} pending)", key, pending.len());
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// One pass over the queue. Retryable failures go back in; rejected
    /// reports are dropped.
    pub async fn flush(&self, store: &dyn ReportStore) -> FlushSummary {
        let batch: Vec<ProctoringReport> = {
            let mut pending = self.pending.lock();
            pending.drain(..).collect()
        };

        let mut summary = FlushSummary::default();
        for report in batch {
            match store.save_report(&report).await {
                Ok(id) => {
                    summary.persisted += 1;
                    telemetry::record(ProctorEvent::report_persisted(&report.key().to_string(), &id));
                }
                Err(e) if e.is_retryable() => {
                    summary.requeued += 1;
                    self.requeue(report);
                }
                Err(e) => {
                    summary.dropped += 1;
                    log::error!("Dropping queued report {}: {}", report.key(), e);
                }
            }
        }

        if summary.persisted > 0 || summary.dropped > 0 {
            log::info!(
                "Outbox flush: {} persisted, {} requeued, {} dropped",
                summary.persisted, summary.requeued, summary.dropped
            );
        }
        summary
    }

    /// Put a failed report back unless a newer one for the same key arrived
    /// during the flush
    fn requeue(&self, report: ProctoringReport) {
        let key = report.key();
        let mut pending = self.pending.lock();
        if !pending.iter().any(|r| r.key() == key) {
            pending.push_front(report);
        }
    }
}

// ============================================================================
// PERSISTER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PersistenceStatus {
    Persisted { id: String },
    /// Store unreachable; the outbox will retry
    Queued,
}

/// Save with bounded retry; never returns before the report is either
/// stored or queued
pub async fn persist_with_retry(
    store: &dyn ReportStore,
    report: &ProctoringReport,
    attempts: u32,
) -> Result<String, StoreError> {
    let attempts = attempts.max(1);
    let mut backoff = INITIAL_BACKOFF;
    let mut last_error = StoreError::Unavailable("no attempt made".into());

    for attempt in 1..=attempts {
        match store.save_report(report).await {
            Ok(id) => return Ok(id),
            Err(e) if e.is_retryable() => {
                log::warn!(
                    "Persist attempt {}/{} for {} failed: {}",
                    attempt, attempts, report.key(), e
                );
                last_error = e;
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error)
}

#[derive(Clone)]
pub struct ReportPersister {
    store: Arc<dyn ReportStore>,
    outbox: Arc<ReportOutbox>,
    attempts: u32,
}

impl ReportPersister {
    pub fn new(store: Arc<dyn ReportStore>, outbox: Arc<ReportOutbox>, attempts: u32) -> Self {
        Self { store, outbox, attempts }
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    pub fn outbox(&self) -> &Arc<ReportOutbox> {
        &self.outbox
    }

    /// Rejected reports are an error; unreachable stores are not
    pub async fn persist(&self, report: &ProctoringReport) -> ProctorResult<PersistenceStatus> {
        let key = report.key().to_string();
        match persist_with_retry(self.store.as_ref(), report, self.attempts).await {
            Ok(id) => {
                log::info!("✅ Report {} persisted as {}", key, id);
                telemetry::record(ProctorEvent::report_persisted(&key, &id));
                Ok(PersistenceStatus::Persisted { id })
            }
            Err(e) if e.is_retryable() => {
                log::error!("Report {} not persisted, queued for retry: {}", key, e);
                telemetry::record(ProctorEvent::report_queued(&key, &e.to_string()));
                self.outbox.push(report.clone());
                Ok(PersistenceStatus::Queued)
            }
            Err(e) => Err(ProctorError::from(e)),
        }
    }
}

// ============================================================================
// FLUSH LOOP
// ============================================================================

/// Periodically re-send queued reports until the handle is aborted
pub fn spawn_flush_loop(
    outbox: Arc<ReportOutbox>,
    store: Arc<dyn ReportStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("Report outbox flush loop started (every {:?})", interval);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !outbox.is_empty() {
                outbox.flush(store.as_ref()).await;
            }
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================
