//! Evidence Capturer
//!
//! One detached upload task per confirmed event. Dispatch returns
//! immediately; results come back through `next_completed` in the order the
//! uploads finish, which is the order evidence is appended to the log.

use std::sync::Arc;

use tokio::task::JoinSet;

use super::uploader::{UploadError, UploadService};
use crate::logic::cheating_log::EvidenceRecord;
use crate::logic::detection::{FrameImage, ViolationEvent, ViolationSignalType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Zero dimensions or no decoded frame
    SurfaceNotReady,
    NoUploader,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SurfaceNotReady => "capture surface not ready",
            Self::NoUploader => "no upload service configured",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Uploaded(EvidenceRecord),
    Failed {
        signal_type: ViolationSignalType,
        error: UploadError,
    },
}

/// `cheating_<type>_<unix-ms>.jpg`
pub fn evidence_file_name(event: &ViolationEvent) -> String {
    format!(
        "cheating_{}_{}.jpg",
        event.signal_type.as_str(),
        event.occurred_at.timestamp_millis()
    )
}

pub struct EvidenceCapturer {
    uploader: Option<Arc<dyn UploadService>>,
    tasks: JoinSet<CaptureOutcome>,
}

impl EvidenceCapturer {
    pub fn new(uploader: Option<Arc<dyn UploadService>>) -> Self {
        Self {
            uploader,
            tasks: JoinSet::new(),
        }
    }

    /// Start an upload for `event` without waiting for it
    pub fn dispatch(&mut self, event: &ViolationEvent, frame: Option<FrameImage>) -> DispatchOutcome {
        let Some(uploader) = self.uploader.clone() else {
            return DispatchOutcome::Skipped(SkipReason::NoUploader);
        };
        let Some(frame) = frame.filter(FrameImage::is_ready) else {
            return DispatchOutcome::Skipped(SkipReason::SurfaceNotReady);
        };

        let signal_type = event.signal_type;
        let detected_at = event.occurred_at;
        let file_name = evidence_file_name(event);

        self.tasks.spawn(async move {
            match uploader.upload(&frame.data, &file_name).await {
                Ok(url) => CaptureOutcome::Uploaded(EvidenceRecord {
                    url,
                    signal_type,
                    detected_at,
                }),
                Err(error) => CaptureOutcome::Failed { signal_type, error },
            }
        });

        DispatchOutcome::Dispatched
    }

    /// Next finished upload. `None` once nothing is in flight.
    pub async fn next_completed(&mut self) -> Option<CaptureOutcome> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => return Some(outcome),
                Err(e) => log::warn!("Evidence task ended abnormally: {}", e),
            }
        }
        None
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel whatever is still uploading. Returns how many were cancelled.
    pub fn abort_all(&mut self) -> usize {
        let pending = self.tasks.len();
        self.tasks.abort_all();
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cheating_log::SessionId;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    /// Sleeps for a per-type delay, then returns a URL naming the file
    struct DelayedUploader;

    #[async_trait]
    impl UploadService for DelayedUploader {
        async fn upload(&self, _bytes: &[u8], file_name: &str) -> Result<String, UploadError> {
            let delay = if file_name.contains("cellPhone") { 300 } else { 50 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if file_name.contains("prohibitedObject") {
                return Err(UploadError::Server(503));
            }
            Ok(format!("https://cdn.example.com/{}", file_name))
        }
    }

    fn event(kind: ViolationSignalType) -> ViolationEvent {
        ViolationEvent {
            signal_type: kind,
            occurred_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            session_id: SessionId::new(),
        }
    }

    fn frame() -> Option<FrameImage> {
        Some(FrameImage { width: 640, height: 480, data: vec![0xFF, 0xD8, 0xFF] })
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            evidence_file_name(&event(ViolationSignalType::CellPhone)),
            "cheating_cellPhone_1700000000123.jpg"
        );
    }

    #[tokio::test]
    async fn test_not_ready_surface_is_skipped() {
        let mut capturer = EvidenceCapturer::new(Some(Arc::new(DelayedUploader)));

        let empty = Some(FrameImage { width: 0, height: 0, data: vec![] });
        assert_eq!(
            capturer.dispatch(&event(ViolationSignalType::NoFace), empty),
            DispatchOutcome::Skipped(SkipReason::SurfaceNotReady)
        );
        assert_eq!(
            capturer.dispatch(&event(ViolationSignalType::NoFace), None),
            DispatchOutcome::Skipped(SkipReason::SurfaceNotReady)
        );
        assert_eq!(capturer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_without_uploader_is_skipped() {
        let mut capturer = EvidenceCapturer::new(None);
        assert_eq!(
            capturer.dispatch(&event(ViolationSignalType::NoFace), frame()),
            DispatchOutcome::Skipped(SkipReason::NoUploader)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_arrive_in_completion_order() {
        let mut capturer = EvidenceCapturer::new(Some(Arc::new(DelayedUploader)));

        // Phone dispatched first but uploads slower
        capturer.dispatch(&event(ViolationSignalType::CellPhone), frame());
        capturer.dispatch(&event(ViolationSignalType::NoFace), frame());
        assert_eq!(capturer.in_flight(), 2);

        let first = capturer.next_completed().await.unwrap();
        let second = capturer.next_completed().await.unwrap();

        match (first, second) {
            (CaptureOutcome::Uploaded(a), CaptureOutcome::Uploaded(b)) => {
                assert_eq!(a.signal_type, ViolationSignalType::NoFace);
                assert_eq!(b.signal_type, ViolationSignalType::CellPhone);
                assert!(b.url.ends_with("cheating_cellPhone_1700000000123.jpg"));
            }
            other => panic!("unexpected outcomes: {:?}", other),
        }
        assert!(capturer.next_completed().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_failure_is_reported_not_raised() {
        let mut capturer = EvidenceCapturer::new(Some(Arc::new(DelayedUploader)));
        capturer.dispatch(&event(ViolationSignalType::ProhibitedObject), frame());

        let outcome = capturer.next_completed().await.unwrap();
        assert_eq!(
            outcome,
            CaptureOutcome::Failed {
                signal_type: ViolationSignalType::ProhibitedObject,
                error: UploadError::Server(503),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_all_cancels_in_flight() {
        let mut capturer = EvidenceCapturer::new(Some(Arc::new(DelayedUploader)));
        capturer.dispatch(&event(ViolationSignalType::CellPhone), frame());
        capturer.dispatch(&event(ViolationSignalType::NoFace), frame());

        assert_eq!(capturer.abort_all(), 2);
        assert!(capturer.next_completed().await.is_none());
    }
}
