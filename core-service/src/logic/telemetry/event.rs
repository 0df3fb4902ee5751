//! Proctoring Event Types
//!
//! Immutable, timestamped audit events for a session's pipeline.
//! Lets an operator trace why a count or a score came out the way it did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::cheating_log::SessionId;
use crate::logic::detection::{ViolationEvent, ViolationSignalType};

// ============================================================================
// EVENT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    AgentStarted,
    AgentStopped,
    SessionStarted,
    /// Debouncer confirmed a violation
    ViolationConfirmed,
    EvidenceAttached,
    /// No capture surface or no uploader
    EvidenceSkipped,
    EvidenceFailed,
    /// A sampling tick failed; the loop continued
    TickFailed,
    SessionSubmitted,
    ReportPersisted,
    /// Persistence failed, report parked in the outbox
    ReportQueued,
    SessionStopped,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AgentStarted => "agent_started",
            EventType::AgentStopped => "agent_stopped",
            EventType::SessionStarted => "session_started",
            EventType::ViolationConfirmed => "violation_confirmed",
            EventType::EvidenceAttached => "evidence_attached",
            EventType::EvidenceSkipped => "evidence_skipped",
            EventType::EvidenceFailed => "evidence_failed",
            EventType::TickFailed => "tick_failed",
            EventType::SessionSubmitted => "session_submitted",
            EventType::ReportPersisted => "report_persisted",
            EventType::ReportQueued => "report_queued",
            EventType::SessionStopped => "session_stopped",
        }
    }

    /// Failures worth surfacing to an operator
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventType::EvidenceFailed | EventType::TickFailed | EventType::ReportQueued
        )
    }
}

// ============================================================================
// PROCTOR EVENT
// ============================================================================

/// Append-only; never modified after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctorEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub session_id: Option<SessionId>,
    pub violation: Option<ViolationSignalType>,
    pub metadata: Option<serde_json::Value>,
    pub description: String,
}

impl ProctorEvent {
    pub fn new(event_type: EventType, description: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            session_id: None,
            violation: None,
            metadata: None,
            description: description.to_string(),
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_violation(mut self, violation: ViolationSignalType) -> Self {
        self.violation = Some(violation);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// One JSON object, no trailing newline
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// CONVENIENCE CONSTRUCTORS
// ============================================================================

impl ProctorEvent {
    pub fn agent_started(version: &str) -> Self {
        Self::new(EventType::AgentStarted, &format!("Proctor agent started (v{})", version))
            .with_metadata(serde_json::json!({
                "version": version,
                "platform": std::env::consts::OS,
            }))
    }

    pub fn agent_stopped(uptime_secs: u64) -> Self {
        Self::new(
            EventType::AgentStopped,
            &format!("Proctor agent stopped (uptime: {}s)", uptime_secs),
        )
        .with_metadata(serde_json::json!({ "uptime_secs": uptime_secs }))
    }

    pub fn session_started(session_id: SessionId, exam_id: &str, candidate_email: &str) -> Self {
        Self::new(
            EventType::SessionStarted,
            &format!("Session started for {} on exam {}", candidate_email, exam_id),
        )
        .with_session(session_id)
        .with_metadata(serde_json::json!({
            "examId": exam_id,
            "candidateEmail": candidate_email,
        }))
    }

    pub fn violation_confirmed(event: &ViolationEvent, count: u32) -> Self {
        Self::new(
            EventType::ViolationConfirmed,
            &format!("{} confirmed (count {})", event.signal_type.title(), count),
        )
        .with_session(event.session_id)
        .with_violation(event.signal_type)
        .with_metadata(serde_json::json!({
            "occurredAt": event.occurred_at,
            "count": count,
        }))
    }

    pub fn evidence_attached(session_id: SessionId, kind: ViolationSignalType, url: &str) -> Self {
        Self::new(EventType::EvidenceAttached, &format!("Evidence for {} at {}", kind, url))
            .with_session(session_id)
            .with_violation(kind)
    }

    pub fn evidence_skipped(session_id: SessionId, kind: ViolationSignalType, reason: &str) -> Self {
        Self::new(
            EventType::EvidenceSkipped,
            &format!("Evidence for {} skipped: {}", kind, reason),
        )
        .with_session(session_id)
        .with_violation(kind)
    }

    pub fn evidence_failed(session_id: SessionId, kind: ViolationSignalType, error: &str) -> Self {
        Self::new(
            EventType::EvidenceFailed,
            &format!("Evidence upload for {} failed: {}", kind, error),
        )
        .with_session(session_id)
        .with_violation(kind)
    }

    pub fn tick_failed(session_id: SessionId, error: &str) -> Self {
        Self::new(EventType::TickFailed, &format!("Sampling tick failed: {}", error))
            .with_session(session_id)
    }

    pub fn session_submitted(session_id: SessionId, integrity_score: u32, duration_minutes: i64) -> Self {
        Self::new(
            EventType::SessionSubmitted,
            &format!("Session submitted: score {} over {} min", integrity_score, duration_minutes),
        )
        .with_session(session_id)
        .with_metadata(serde_json::json!({
            "integrityScore": integrity_score,
            "interviewDuration": duration_minutes,
        }))
    }

    pub fn report_persisted(report_key: &str, report_id: &str) -> Self {
        Self::new(
            EventType::ReportPersisted,
            &format!("Report {} persisted as {}", report_key, report_id),
        )
    }

    pub fn report_queued(report_key: &str, error: &str) -> Self {
        Self::new(
            EventType::ReportQueued,
            &format!("Report {} queued for retry: {}", report_key, error),
        )
    }

    pub fn session_stopped(session_id: SessionId, evidence_pending: usize) -> Self {
        Self::new(
            EventType::SessionStopped,
            &format!("Session stopped ({} evidence upload(s) abandoned)", evidence_pending),
        )
        .with_session(session_id)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = ProctorEvent::new(EventType::TickFailed, "camera hiccup");
        assert!(!event.id.is_empty());
        assert_eq!(event.event_type, EventType::TickFailed);
        assert!(event.event_type.is_failure());
        assert!(event.session_id.is_none());
    }

    #[test]
    fn test_violation_confirmed_carries_context() {
        let session = SessionId::new();
        let violation = ViolationEvent {
            signal_type: ViolationSignalType::CellPhone,
            occurred_at: Utc::now(),
            session_id: session,
        };
        let event = ProctorEvent::violation_confirmed(&violation, 2);

        assert_eq!(event.session_id, Some(session));
        assert_eq!(event.violation, Some(ViolationSignalType::CellPhone));
        assert!(event.description.contains("Cell Phone Detected"));
        assert_eq!(event.metadata.unwrap()["count"], 2);
    }

    #[test]
    fn test_event_to_jsonl() {
        let event = ProctorEvent::agent_started("0.1.0");
        let jsonl = event.to_jsonl();
        assert!(jsonl.contains("AgentStarted"));
        assert!(!jsonl.contains('\n'));
    }
}
