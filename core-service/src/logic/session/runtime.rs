//! Session Runtime
//!
//! One task per exam session. Owns the session's detector, debouncer,
//! aggregator and evidence uploads; nothing else writes its cheating log.
//!
//! The loop multiplexes the sampling tick, focus transitions, finished
//! uploads, commands from the manager and the optional hard deadline.
//! Tick processing never awaits, so a slow upload cannot delay sampling.

use std::future::pending;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::logic::cheating_log::{CheatingLog, CheatingLogAggregator, LogUpdate, SessionId};
use crate::logic::config::SessionSettings;
use crate::logic::detection::{
    classify_focus, classify_frame, Debouncer, DetectionSource, FocusTransition, ViolationEvent,
};
use crate::logic::error::ProctorResult;
use crate::logic::evidence::{CaptureOutcome, DispatchOutcome, EvidenceCapturer};
use crate::logic::report::{build_report, PersistenceStatus, ProctoringReport, ReportPersister};
use crate::logic::scoring::IntegrityAssessment;
use crate::logic::telemetry::{self, ProctorEvent};

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug)]
pub enum SessionCommand {
    /// Partial update from an independently running tracker
    Merge(LogUpdate),
    Submit,
}

/// Outcome of a submitted (or timed-out) session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub report: ProctoringReport,
    pub assessment: IntegrityAssessment,
    pub persistence: PersistenceStatus,
}

pub type SubmissionSlot = Option<ProctorResult<Submission>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishReason {
    Submitted,
    Deadline,
    /// Every handle was dropped without submitting
    Released,
}

// ============================================================================
// RUNTIME
// ============================================================================

pub struct SessionRuntime {
    session_id: SessionId,
    source: Box<dyn DetectionSource>,
    focus_rx: Option<mpsc::Receiver<FocusTransition>>,
    commands: mpsc::Receiver<SessionCommand>,
    debouncer: Debouncer,
    aggregator: CheatingLogAggregator,
    capturer: EvidenceCapturer,
    snapshot_tx: watch::Sender<CheatingLog>,
    submission_tx: watch::Sender<SubmissionSlot>,
    persister: ReportPersister,
    settings: SessionSettings,
    started_at: DateTime<Utc>,
}

pub struct RuntimeParts {
    pub log: CheatingLog,
    pub source: Box<dyn DetectionSource>,
    pub focus_rx: mpsc::Receiver<FocusTransition>,
    pub commands: mpsc::Receiver<SessionCommand>,
    pub capturer: EvidenceCapturer,
    pub snapshot_tx: watch::Sender<CheatingLog>,
    pub submission_tx: watch::Sender<SubmissionSlot>,
    pub persister: ReportPersister,
    pub settings: SessionSettings,
}

impl SessionRuntime {
    pub fn new(parts: RuntimeParts) -> Self {
        let session_id = parts.log.session_id;
        Self {
            session_id,
            source: parts.source,
            focus_rx: Some(parts.focus_rx),
            commands: parts.commands,
            debouncer: Debouncer::with_cooldown(session_id, parts.settings.cooldown),
            aggregator: CheatingLogAggregator::new(parts.log),
            capturer: parts.capturer,
            snapshot_tx: parts.snapshot_tx,
            submission_tx: parts.submission_tx,
            persister: parts.persister,
            settings: parts.settings,
            started_at: Utc::now(),
        }
    }

    pub async fn run(mut self) {
        let period = self.settings.sample_interval.max(std::time::Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let deadline = self.settings.exam_duration.map(|d| Instant::now() + d);
        let expiry = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        log::info!("Session {} running (tick {:?})", self.session_id, period);

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick(),

                transition = next_focus(&mut self.focus_rx) => match transition {
                    Some(transition) => self.on_focus(transition),
                    None => {
                        log::debug!("Focus tracker for session {} disconnected", self.session_id);
                        self.focus_rx = None;
                    }
                },

                Some(outcome) = self.capturer.next_completed(), if self.capturer.in_flight() > 0 => {
                    self.on_capture(outcome);
                }

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Merge(update)) => {
                        self.aggregator.merge(&update);
                        self.publish();
                    }
                    Some(SessionCommand::Submit) => break FinishReason::Submitted,
                    None => break FinishReason::Released,
                },

                _ = &mut expiry => {
                    log::warn!("Session {} reached its hard deadline", self.session_id);
                    break FinishReason::Deadline;
                }
            }
        };

        self.finish(reason).await;
    }

    // ========================================================================
    // EVENT HANDLERS
    // ========================================================================

    fn on_tick(&mut self) {
        let frame = match self.source.sample() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Session {} tick failed: {}", self.session_id, e);
                telemetry::record(ProctorEvent::tick_failed(self.session_id, &e.to_string()));
                return;
            }
        };

        let confirmed = self.debouncer.offer_all(classify_frame(&frame));
        if confirmed.is_empty() {
            return;
        }
        for event in &confirmed {
            self.confirm(event);
        }
        self.publish();
    }

    fn on_focus(&mut self, transition: FocusTransition) {
        let Some(candidate) = classify_focus(transition, Utc::now()) else {
            return;
        };
        if let Some(event) = self.debouncer.offer(candidate) {
            self.confirm(&event);
            self.publish();
        }
    }

    /// Count first, then try for evidence
    fn confirm(&mut self, event: &ViolationEvent) {
        let count = self.aggregator.record(event);
        log::info!(
            "⚠️ {} in session {} (count {})",
            event.signal_type.title(),
            self.session_id,
            count
        );
        telemetry::record(ProctorEvent::violation_confirmed(event, count));

        if !event.signal_type.captures_evidence() {
            return;
        }
        if let DispatchOutcome::Skipped(reason) = self.capturer.dispatch(event, self.source.snapshot()) {
            log::debug!("Evidence for {} skipped: {}", event.signal_type, reason.as_str());
            telemetry::record(ProctorEvent::evidence_skipped(
                self.session_id,
                event.signal_type,
                reason.as_str(),
            ));
        }
    }

    fn on_capture(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Uploaded(record) => {
                let (kind, url) = (record.signal_type, record.url.clone());
                if self.aggregator.attach_evidence(record) {
                    telemetry::record(ProctorEvent::evidence_attached(self.session_id, kind, &url));
                    self.publish();
                }
            }
            CaptureOutcome::Failed { signal_type, error } => {
                log::warn!("Evidence upload for {} failed: {}", signal_type, error);
                telemetry::record(ProctorEvent::evidence_failed(
                    self.session_id,
                    signal_type,
                    &error.to_string(),
                ));
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.aggregator.snapshot());
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    async fn finish(mut self, reason: FinishReason) {
        // Stop listening before the report is built
        self.focus_rx = None;
        self.source.stop();
        let ended_at = Utc::now();

        if reason != FinishReason::Released {
            let log = self.aggregator.snapshot();
            let outcome =
                submit(self.session_id, &log, self.started_at, ended_at, &self.persister).await;
            if let Err(e) = &outcome {
                log::error!("Session {} submission failed: {}", self.session_id, e);
            }
            self.submission_tx.send_replace(Some(outcome));
        }

        // Late evidence still lands in the cheating log, not the report
        let drain = tokio::time::timeout(self.settings.evidence_drain, self.drain_evidence()).await;
        if drain.is_err() {
            log::warn!("Session {} evidence drain timed out", self.session_id);
        }
        let abandoned = self.capturer.abort_all();
        self.publish();

        let log = self.aggregator.snapshot();
        if let Err(e) = self.persister.store().save_cheating_log(&log).await {
            log::warn!("Cheating log for session {} not saved: {}", self.session_id, e);
        }

        telemetry::record(ProctorEvent::session_stopped(self.session_id, abandoned));
        log::info!("Session {} stopped ({:?})", self.session_id, reason);
    }

    async fn drain_evidence(&mut self) {
        while let Some(outcome) = self.capturer.next_completed().await {
            self.on_capture(outcome);
        }
    }
}

/// Build, score and persist. Takes parts rather than the runtime, which
/// owns a detector that is `Send` but not `Sync`.
async fn submit(
    session_id: SessionId,
    log: &CheatingLog,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    persister: &ReportPersister,
) -> ProctorResult<Submission> {
    let (report, assessment) = build_report(log, started_at, ended_at)?;

    telemetry::record(ProctorEvent::session_submitted(
        session_id,
        assessment.integrity_score,
        assessment.duration_minutes,
    ));

    let persistence = persister.persist(&report).await?;
    Ok(Submission {
        report,
        assessment,
        persistence,
    })
}

async fn next_focus(rx: &mut Option<mpsc::Receiver<FocusTransition>>) -> Option<FocusTransition> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}
