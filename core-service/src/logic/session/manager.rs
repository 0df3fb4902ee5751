//! Session Manager
//!
//! Registry of running sessions addressed by `SessionId`. Each session is an
//! independent runtime task; the manager only holds the channels to it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::runtime::{RuntimeParts, SessionCommand, SessionRuntime, Submission, SubmissionSlot};
use crate::logic::cheating_log::{CandidateIdentity, CheatingLog, LogUpdate, SessionId};
use crate::logic::config::SessionSettings;
use crate::logic::detection::{DetectionSource, FocusTransition};
use crate::logic::error::{ProctorError, ProctorResult};
use crate::logic::evidence::{EvidenceCapturer, UploadService};
use crate::logic::report::{ReportOutbox, ReportPersister};
use crate::logic::telemetry::{self, ProctorEvent};

/// Room for merges queued while a tick is being processed
const COMMAND_BUFFER: usize = 32;

/// Buffer a focus tracker should use for its sender
pub const FOCUS_BUFFER: usize = 64;

struct SessionHandle {
    exam_id: String,
    commands: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<CheatingLog>,
    submission_rx: watch::Receiver<SubmissionSlot>,
    task: JoinHandle<()>,
}

pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    persister: ReportPersister,
    uploader: Option<Arc<dyn UploadService>>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(
        persister: ReportPersister,
        uploader: Option<Arc<dyn UploadService>>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            persister,
            uploader,
            settings,
        }
    }

    pub fn outbox(&self) -> &Arc<ReportOutbox> {
        self.persister.outbox()
    }

    /// Validate identity, start the detector and spawn the session task.
    /// Must be called from within a tokio runtime.
    pub fn start_session(
        &self,
        exam_id: &str,
        candidate: CandidateIdentity,
        mut source: Box<dyn DetectionSource>,
        focus_rx: mpsc::Receiver<FocusTransition>,
    ) -> ProctorResult<SessionId> {
        let log = CheatingLog::new(SessionId::new(), exam_id, candidate);
        log.validate()?;

        source
            .start()
            .map_err(|e| ProctorError::DetectionUnavailable(e.to_string()))?;

        let session_id = log.session_id;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(log.clone());
        let (submission_tx, submission_rx) = watch::channel(None);

        telemetry::record(ProctorEvent::session_started(
            session_id,
            &log.exam_id,
            &log.candidate_identity.email,
        ));
        log::info!(
            "Session {} started: {} on exam {}",
            session_id, log.candidate_identity.email, log.exam_id
        );

        let handle_exam_id = log.exam_id.clone();
        let runtime = SessionRuntime::new(RuntimeParts {
            log,
            source,
            focus_rx,
            commands: command_rx,
            capturer: EvidenceCapturer::new(self.uploader.clone()),
            snapshot_tx,
            submission_tx,
            persister: self.persister.clone(),
            settings: self.settings,
        });
        let task = tokio::spawn(runtime.run());

        self.prune_finished();
        self.sessions.write().insert(
            session_id,
            SessionHandle {
                exam_id: handle_exam_id,
                commands: command_tx,
                snapshot_rx,
                submission_rx,
                task,
            },
        );

        Ok(session_id)
    }

    /// Live read-only view of the session's log
    pub fn current_log(&self, id: SessionId) -> ProctorResult<CheatingLog> {
        let sessions = self.sessions.read();
        let handle = sessions
            .get(&id)
            .ok_or_else(|| ProctorError::SessionNotFound(id.to_string()))?;
        let log = handle.snapshot_rx.borrow().clone();
        Ok(log)
    }

    /// Forward a tracker's partial update to the session
    pub async fn merge(&self, id: SessionId, update: LogUpdate) -> ProctorResult<()> {
        let commands = self.with_handle(id, |h| h.commands.clone())?;
        commands
            .send(SessionCommand::Merge(update))
            .await
            .map_err(|_| ProctorError::SessionClosed(id.to_string()))
    }

    /// End the session and return its report. Calling it again, or after the
    /// hard deadline already ended the session, returns the same outcome.
    /// The handle stays registered until `release`, or until a later
    /// `start_session` prunes it once its task has wound down.
    pub async fn submit_session(&self, id: SessionId) -> ProctorResult<Submission> {
        let (commands, mut submission_rx) =
            self.with_handle(id, |h| (h.commands.clone(), h.submission_rx.clone()))?;

        if submission_rx.borrow().is_none() {
            // Already finishing if the runtime is gone; the slot tells us how
            let _ = commands.send(SessionCommand::Submit).await;
        }

        let slot = submission_rx
            .wait_for(|slot| slot.is_some())
            .await
            .map_err(|_| ProctorError::SessionClosed(id.to_string()))?;

        match &*slot {
            Some(outcome) => outcome.clone(),
            None => Err(ProctorError::SessionClosed(id.to_string())),
        }
    }

    /// Forget the session and wait for its task to wind down (evidence
    /// drain and cheating-log save included). Unsubmitted sessions are
    /// stopped without a report.
    pub async fn release(&self, id: SessionId) -> bool {
        let Some(handle) = self.sessions.write().remove(&id) else {
            return false;
        };
        drop(handle.commands);

        if let Err(e) = handle.task.await {
            log::warn!("Session {} task ended abnormally: {}", id, e);
        }
        true
    }

    /// Drop handles whose task has ended (submitted or timed out, teardown
    /// done). Returns how many were dropped.
    pub fn prune_finished(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, h| {
            let finished = h.task.is_finished();
            if finished {
                log::debug!("Session {} pruned from registry", id);
            }
            !finished
        });
        before - sessions.len()
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        self.sessions.read().keys().copied().collect()
    }

    pub fn sessions_for_exam(&self, exam_id: &str) -> Vec<SessionId> {
        self.sessions
            .read()
            .iter()
            .filter(|(_, h)| h.exam_id == exam_id)
            .map(|(id, _)| *id)
            .collect()
    }

    fn with_handle<T>(&self, id: SessionId, f: impl FnOnce(&SessionHandle) -> T) -> ProctorResult<T> {
        self.sessions
            .read()
            .get(&id)
            .map(f)
            .ok_or_else(|| ProctorError::SessionNotFound(id.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cheating_log::ViolationCounts;
    use crate::logic::detection::{Detection, DetectionError, DetectionFrame, FrameImage};
    use crate::logic::evidence::UploadError;
    use crate::logic::report::{InMemoryReportStore, PersistenceStatus, ReportStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays a fixed list of frames one second apart, then clean frames
    struct ScriptedSource {
        frames: VecDeque<Result<Vec<&'static str>, DetectionError>>,
        base: DateTime<Utc>,
        tick: i64,
        fail_start: bool,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<Vec<&'static str>, DetectionError>>) -> Self {
            Self {
                frames: frames.into(),
                base: Utc::now(),
                tick: 0,
                fail_start: false,
            }
        }

        fn labels(frames: &[&[&'static str]]) -> Self {
            Self::new(frames.iter().map(|f| Ok(f.to_vec())).collect())
        }
    }

    impl DetectionSource for ScriptedSource {
        fn start(&mut self) -> Result<(), DetectionError> {
            if self.fail_start {
                return Err(DetectionError::Unavailable("camera permission denied".into()));
            }
            Ok(())
        }

        fn sample(&mut self) -> Result<DetectionFrame, DetectionError> {
            let at = self.base + ChronoDuration::seconds(self.tick);
            self.tick += 1;
            let labels = self.frames.pop_front().unwrap_or_else(|| Ok(vec!["person"]))?;
            Ok(DetectionFrame::new(
                at,
                labels.into_iter().map(|l| Detection::new(l, 0.9)).collect(),
            ))
        }

        fn snapshot(&self) -> Option<FrameImage> {
            Some(FrameImage { width: 640, height: 480, data: vec![0xFF, 0xD8] })
        }
    }

    struct InstantUploader;

    #[async_trait]
    impl UploadService for InstantUploader {
        async fn upload(&self, _bytes: &[u8], file_name: &str) -> Result<String, UploadError> {
            Ok(format!("https://cdn.example.com/{}", file_name))
        }
    }

    fn manager(store: Arc<InMemoryReportStore>, settings: SessionSettings) -> SessionManager {
        let persister = ReportPersister::new(store, Arc::new(ReportOutbox::new()), 3);
        SessionManager::new(persister, Some(Arc::new(InstantUploader)), settings)
    }

    fn ann() -> CandidateIdentity {
        CandidateIdentity::new("Ann Lee", "ann@example.com")
    }

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let mgr = manager(Arc::new(InMemoryReportStore::new()), SessionSettings::default());
        let (_tx, rx) = mpsc::channel(FOCUS_BUFFER);

        let result = mgr.start_session(
            "exam-1",
            CandidateIdentity::new("", "ann@example.com"),
            Box::new(ScriptedSource::labels(&[])),
            rx,
        );
        assert_eq!(result, Err(ProctorError::MissingIdentity("candidate name")));
        assert!(mgr.active_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_detector_failure_is_fatal_to_start() {
        let mgr = manager(Arc::new(InMemoryReportStore::new()), SessionSettings::default());
        let (_tx, rx) = mpsc::channel(FOCUS_BUFFER);
        let mut source = ScriptedSource::labels(&[]);
        source.fail_start = true;

        let result = mgr.start_session("exam-1", ann(), Box::new(source), rx);
        assert!(matches!(result, Err(ProctorError::DetectionUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let mgr = manager(Arc::new(InMemoryReportStore::new()), SessionSettings::default());
        let id = SessionId::new();
        assert_eq!(mgr.current_log(id), Err(ProctorError::SessionNotFound(id.to_string())));
        assert!(mgr.submit_session(id).await.is_err());
        assert!(!mgr.release(id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_session_pipeline() {
        let store = Arc::new(InMemoryReportStore::new());
        let mgr = manager(store.clone(), SessionSettings::default());
        let (focus_tx, focus_rx) = mpsc::channel(FOCUS_BUFFER);

        let source = ScriptedSource::labels(&[
            &[],                        // no face
            &[],                        // suppressed by cooldown
            &["person", "cell phone"],  // phone
            &["person", "person"],      // multiple faces
        ]);
        let id = mgr.start_session("exam-1", ann(), Box::new(source), focus_rx).unwrap();

        focus_tx.send(FocusTransition::TabHidden).await.unwrap();
        focus_tx.send(FocusTransition::TabVisible).await.unwrap();
        focus_tx.send(FocusTransition::WindowBlur).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5_500)).await;

        let live = mgr.current_log(id).unwrap();
        assert_eq!(
            live.counts,
            ViolationCounts {
                no_face: 1,
                multiple_face: 1,
                cell_phone: 1,
                prohibited_object: 0,
                focus_lost: 2,
            }
        );

        let submission = mgr.submit_session(id).await.unwrap();
        // 100 - 3 - 10 - 15 - 2*2
        assert_eq!(submission.report.integrity_score, 68);
        assert_eq!(submission.report.focus_lost_count, 2);
        assert!(matches!(submission.persistence, PersistenceStatus::Persisted { .. }));

        let stored = store.find_report("exam-1", "ann@example.com").await.unwrap().unwrap();
        assert_eq!(stored, submission.report);

        // Second submission returns the same outcome, no duplicate report
        assert_eq!(mgr.submit_session(id).await.unwrap(), submission);
        assert_eq!(store.report_count(), 1);

        assert!(mgr.release(id).await);
        let logs = store.list_cheating_logs("exam-1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].evidence.len(), 3);
        assert!(logs[0].evidence_within_counts());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_errors_do_not_stop_sampling() {
        let store = Arc::new(InMemoryReportStore::new());
        let mgr = manager(store, SessionSettings::default());
        let (_focus_tx, focus_rx) = mpsc::channel(FOCUS_BUFFER);

        let source = ScriptedSource::new(vec![
            Err(DetectionError::Frame("decode failed".into())),
            Err(DetectionError::Frame("decode failed".into())),
            Ok(vec!["person", "book"]),
        ]);
        let id = mgr.start_session("exam-1", ann(), Box::new(source), focus_rx).unwrap();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(mgr.current_log(id).unwrap().counts.prohibited_object, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_takes_submission_path() {
        let store = Arc::new(InMemoryReportStore::new());
        let settings = SessionSettings {
            exam_duration: Some(Duration::from_secs(3)),
            ..SessionSettings::default()
        };
        let mgr = manager(store.clone(), settings);
        let (_focus_tx, focus_rx) = mpsc::channel(FOCUS_BUFFER);

        let source = ScriptedSource::labels(&[&["person", "cell phone"]]);
        let id = mgr.start_session("exam-1", ann(), Box::new(source), focus_rx).unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.report_count(), 1);

        let submission = mgr.submit_session(id).await.unwrap();
        assert_eq!(submission.report.integrity_score, 85);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_sessions_are_pruned() {
        let store = Arc::new(InMemoryReportStore::new());
        let settings = SessionSettings {
            exam_duration: Some(Duration::from_secs(2)),
            ..SessionSettings::default()
        };
        let mgr = manager(store.clone(), settings);

        let (_tx1, rx1) = mpsc::channel(FOCUS_BUFFER);
        let first = mgr
            .start_session("exam-1", ann(), Box::new(ScriptedSource::labels(&[&["person"]])), rx1)
            .unwrap();

        // Deadline ends the first session; its teardown runs to completion
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(store.list_cheating_logs("exam-1").await.unwrap().len(), 1);

        let (_tx2, rx2) = mpsc::channel(FOCUS_BUFFER);
        let second = mgr
            .start_session(
                "exam-1",
                CandidateIdentity::new("Bo Chen", "bo@example.com"),
                Box::new(ScriptedSource::labels(&[&["person"]])),
                rx2,
            )
            .unwrap();

        assert_eq!(mgr.active_sessions(), vec![second]);
        assert!(matches!(mgr.current_log(first), Err(ProctorError::SessionNotFound(_))));
        assert!(!mgr.release(first).await);
        assert_eq!(mgr.prune_finished(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_tracker_totals_merge_by_max() {
        let store = Arc::new(InMemoryReportStore::new());
        let mgr = manager(store, SessionSettings::default());
        let (_focus_tx, focus_rx) = mpsc::channel(FOCUS_BUFFER);

        let id = mgr
            .start_session("exam-1", ann(), Box::new(ScriptedSource::labels(&[&["person"]])), focus_rx)
            .unwrap();

        mgr.merge(id, LogUpdate::focus_total(4)).await.unwrap();
        mgr.merge(id, LogUpdate::focus_total(4)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(mgr.current_log(id).unwrap().counts.focus_lost, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_session_rejects_merges() {
        let store = Arc::new(InMemoryReportStore::new());
        let mgr = manager(store.clone(), SessionSettings::default());
        let (_focus_tx, focus_rx) = mpsc::channel(FOCUS_BUFFER);

        let id = mgr
            .start_session("exam-1", ann(), Box::new(ScriptedSource::labels(&[])), focus_rx)
            .unwrap();
        assert_eq!(mgr.sessions_for_exam("exam-1"), vec![id]);

        assert!(mgr.release(id).await);
        assert!(mgr.merge(id, LogUpdate::focus_total(1)).await.is_err());
        assert_eq!(store.report_count(), 0);
        assert_eq!(store.list_cheating_logs("exam-1").await.unwrap().len(), 1);
    }
}
