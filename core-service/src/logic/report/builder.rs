//! Report Builder
//!
//! Combines a finalized log with session timestamps and the scoring output.
//! Does not persist; see `store` and `outbox`.

use chrono::{DateTime, Utc};

use super::types::{ProctoringReport, SuspiciousEvents};
use crate::logic::cheating_log::{CheatingLog, ViolationCounts};
use crate::logic::error::{ProctorError, ProctorResult};
use crate::logic::scoring::{self, IntegrityAssessment};

const MS_PER_MINUTE: i64 = 60_000;

/// `round((end - start) / 60000)`; `end < start` is a caller error
pub fn interview_duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> ProctorResult<i64> {
    if end < start {
        return Err(ProctorError::InvalidTimeRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }

    let ms = end.signed_duration_since(start).num_milliseconds();
    // Half a minute rounds up
    Ok((ms + MS_PER_MINUTE / 2) / MS_PER_MINUTE)
}

pub fn suspicious_events(counts: &ViolationCounts) -> SuspiciousEvents {
    SuspiciousEvents {
        multiple_faces: counts.multiple_face,
        no_face_detected: counts.no_face,
        phone_detected: counts.cell_phone,
        notes_detected: counts.prohibited_object,
    }
}

/// Build the report for a finalized log
pub fn build_report(
    log: &CheatingLog,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ProctorResult<(ProctoringReport, IntegrityAssessment)> {
    log.validate()?;
    let duration = interview_duration_minutes(start, end)?;
    let assessment = scoring::score_log(log, duration);

    let report = ProctoringReport {
        candidate_name: log.candidate_identity.name.clone(),
        candidate_email: log.candidate_identity.email.clone(),
        exam_id: log.exam_id.clone(),
        start_time: start,
        end_time: end,
        interview_duration: duration,
        focus_lost_count: log.counts.focus_lost,
        suspicious_events: suspicious_events(&log.counts),
        integrity_score: assessment.integrity_score,
    };

    Ok((report, assessment))
}

/// Recompute duration and score of a report from its own fields
pub fn recompute(report: &ProctoringReport) -> ProctorResult<ProctoringReport> {
    let duration = interview_duration_minutes(report.start_time, report.end_time)?;
    let assessment = scoring::score(&report.counts(), duration);

    Ok(ProctoringReport {
        interview_duration: duration,
        integrity_score: assessment.integrity_score,
        ..report.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cheating_log::{CandidateIdentity, SessionId};
    use chrono::Duration;

    fn log_with(counts: ViolationCounts) -> CheatingLog {
        let mut log = CheatingLog::new(
            SessionId::new(),
            "exam-42",
            CandidateIdentity::new("Ann Lee", "ann@example.com"),
        );
        log.counts = counts;
        log
    }

    #[test]
    fn test_ninety_minute_session() {
        let start = Utc::now();
        let end = start + Duration::minutes(90);
        assert_eq!(interview_duration_minutes(start, end), Ok(90));
    }

    #[test]
    fn test_duration_rounds_to_nearest_minute() {
        let start = Utc::now();
        assert_eq!(interview_duration_minutes(start, start + Duration::seconds(29)), Ok(0));
        assert_eq!(interview_duration_minutes(start, start + Duration::seconds(30)), Ok(1));
        assert_eq!(interview_duration_minutes(start, start + Duration::seconds(149)), Ok(2));
        assert_eq!(interview_duration_minutes(start, start), Ok(0));
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let start = Utc::now();
        let result = interview_duration_minutes(start, start - Duration::seconds(1));
        assert!(matches!(result, Err(ProctorError::InvalidTimeRange { .. })));
    }

    #[test]
    fn test_report_copies_counts_and_score() {
        let counts = ViolationCounts {
            focus_lost: 3,
            multiple_face: 1,
            no_face: 2,
            cell_phone: 0,
            prohibited_object: 1,
        };
        let start = Utc::now();
        let (report, assessment) =
            build_report(&log_with(counts), start, start + Duration::minutes(60)).unwrap();

        assert_eq!(report.exam_id, "exam-42");
        assert_eq!(report.candidate_email, "ann@example.com");
        assert_eq!(report.focus_lost_count, 3);
        assert_eq!(report.suspicious_events.multiple_faces, 1);
        assert_eq!(report.suspicious_events.no_face_detected, 2);
        assert_eq!(report.suspicious_events.notes_detected, 1);
        assert_eq!(report.interview_duration, 60);
        assert_eq!(report.integrity_score, 68);
        assert_eq!(assessment.total_deductions, 32);
        assert_eq!(report.counts(), counts);
    }

    #[test]
    fn test_report_requires_identity() {
        let mut log = log_with(ViolationCounts::default());
        log.candidate_identity.name.clear();
        let start = Utc::now();
        assert!(build_report(&log, start, start).is_err());
    }

    #[test]
    fn test_recompute_overrides_submitted_score() {
        let start = Utc::now();
        let (mut report, _) = build_report(
            &log_with(ViolationCounts { cell_phone: 2, ..Default::default() }),
            start,
            start + Duration::minutes(10),
        )
        .unwrap();
        report.integrity_score = 100;
        report.interview_duration = 999;

        let fixed = recompute(&report).unwrap();
        assert_eq!(fixed.integrity_score, 70);
        assert_eq!(fixed.interview_duration, 10);
    }

    #[test]
    fn test_report_serializes_wire_names() {
        let start = Utc::now();
        let (report, _) = build_report(&log_with(ViolationCounts::default()), start, start).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["integrityScore"], 100);
        assert!(json["suspiciousEvents"].get("phoneDetected").is_some());
        assert!(json.get("interviewDuration").is_some());
    }
}
