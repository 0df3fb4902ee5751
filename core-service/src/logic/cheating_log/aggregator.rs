//! Cheating Log Aggregator
//!
//! Owns one session's `CheatingLog` and is the only thing that mutates it.
//! Counts only ever grow. Updates from independently running producers
//! (the visual detector, the focus tracker) go through `merge`, which applies
//! an explicit policy per update:
//! - `Additive`: per-event deltas, summed
//! - `Cumulative`: a producer's running total, merged by `max` so that a
//!   re-sent total is not counted twice

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{CheatingLog, EvidenceRecord, ViolationCounts};
use crate::logic::detection::{ViolationEvent, ViolationSignalType};
use crate::logic::error::ProctorResult;

// ============================================================================
// UPDATE SOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateSource {
    Detector,
    Focus,
}

impl UpdateSource {
    /// Counters a producer is allowed to touch
    pub fn owns(&self, kind: ViolationSignalType) -> bool {
        match self {
            Self::Focus => kind == ViolationSignalType::FocusLost,
            Self::Detector => kind != ViolationSignalType::FocusLost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergePolicy {
    Additive,
    Cumulative,
}

/// A validated partial update from one producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogUpdate {
    pub source: UpdateSource,
    pub policy: MergePolicy,
    counts: ViolationCounts,
}

impl LogUpdate {
    /// Build an update; fields the source does not own are zeroed
    pub fn new(source: UpdateSource, policy: MergePolicy, counts: ViolationCounts) -> Self {
        let mut owned = ViolationCounts::default();
        for kind in ViolationSignalType::ALL {
            if source.owns(kind) {
                owned.set(kind, counts.get(kind));
            } else if counts.get(kind) > 0 {
                log::warn!(
                    "Dropping {}={} from {:?} update: field not owned by that producer",
                    kind, counts.get(kind), source
                );
            }
        }
        Self { source, policy, counts: owned }
    }

    /// Per-event deltas from the visual detector
    pub fn detector_delta(counts: ViolationCounts) -> Self {
        Self::new(UpdateSource::Detector, MergePolicy::Additive, counts)
    }

    /// Running focus-loss total from the focus tracker
    pub fn focus_total(focus_lost: u32) -> Self {
        Self::new(
            UpdateSource::Focus,
            MergePolicy::Cumulative,
            ViolationCounts { focus_lost, ..Default::default() },
        )
    }

    /// Normalize an untrusted JSON payload into an update
    pub fn from_raw(source: UpdateSource, policy: MergePolicy, raw: &Value) -> Self {
        Self::new(source, policy, normalize_counts(raw))
    }

    pub fn counts(&self) -> &ViolationCounts {
        &self.counts
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Accepts both the nested `{"counts": {"noFace": ..}}` shape and the flat
/// `{"noFaceCount": ..}` shape. Missing, null, negative, fractional-negative
/// or unparsable values become 0; fractions are truncated.
pub fn normalize_counts(raw: &Value) -> ViolationCounts {
    let nested = raw.get("counts").filter(|v| v.is_object());
    let mut counts = ViolationCounts::default();

    for kind in ViolationSignalType::ALL {
        let flat_key = format!("{}Count", kind.as_str());
        let value = nested
            .and_then(|c| c.get(kind.as_str()))
            .or_else(|| raw.get(kind.as_str()))
            .or_else(|| raw.get(flat_key.as_str()));
        counts.set(kind, coerce_count(value));
    }

    counts
}

fn coerce_count(value: Option<&Value>) -> u32 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() && n > 0.0 => n.min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct CheatingLogAggregator {
    log: CheatingLog,
    rejected_evidence: u64,
}

impl CheatingLogAggregator {
    pub fn new(log: CheatingLog) -> Self {
        Self {
            log,
            rejected_evidence: 0,
        }
    }

    /// +1 for `kind`. Returns the new count.
    pub fn record_event(&mut self, kind: ViolationSignalType) -> u32 {
        self.log.counts.increment(kind)
    }

    /// Record a confirmed event from the debouncer
    pub fn record(&mut self, event: &ViolationEvent) -> u32 {
        self.record_event(event.signal_type)
    }

    /// Record by external type name; unknown names are a caller error
    pub fn record_named(&mut self, kind: &str) -> ProctorResult<u32> {
        let kind: ViolationSignalType = kind.parse()?;
        Ok(self.record_event(kind))
    }

    /// Append evidence. Refused if it would exceed the confirmed count for
    /// its type, since evidence is a subset of confirmed events.
    pub fn attach_evidence(&mut self, record: EvidenceRecord) -> bool {
        let kind = record.signal_type;
        if self.log.evidence_of(kind) >= self.log.counts.get(kind) as usize {
            self.rejected_evidence += 1;
            log::warn!(
                "Evidence for {} rejected: would exceed {} confirmed event(s)",
                kind,
                self.log.counts.get(kind)
            );
            return false;
        }
        self.log.evidence.push(record);
        true
    }

    /// Merge a producer's update. Never decreases any count.
    pub fn merge(&mut self, update: &LogUpdate) {
        let before = self.log.counts;
        self.log.counts = match update.policy {
            MergePolicy::Additive => before.sum(update.counts()),
            MergePolicy::Cumulative => before.max(update.counts()),
        };
        debug_assert!(self.log.counts.dominates(&before));
        log::debug!(
            "Merged {:?}/{:?} update into session {}",
            update.source, update.policy, self.log.session_id
        );
    }

    pub fn counts(&self) -> &ViolationCounts {
        &self.log.counts
    }

    pub fn log(&self) -> &CheatingLog {
        &self.log
    }

    /// Read-only copy for live display
    pub fn snapshot(&self) -> CheatingLog {
        self.log.clone()
    }

    pub fn rejected_evidence(&self) -> u64 {
        self.rejected_evidence
    }

    pub fn into_log(self) -> CheatingLog {
        self.log
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cheating_log::types::{CandidateIdentity, SessionId};
    use chrono::Utc;
    use serde_json::json;

    fn aggregator() -> CheatingLogAggregator {
        CheatingLogAggregator::new(CheatingLog::new(
            SessionId::new(),
            "exam-1",
            CandidateIdentity::new("Ann", "ann@example.com"),
        ))
    }

    fn evidence(kind: ViolationSignalType) -> EvidenceRecord {
        EvidenceRecord {
            url: format!("https://cdn.example.com/{}.jpg", kind),
            signal_type: kind,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_event_increments() {
        let mut agg = aggregator();
        assert_eq!(agg.record_event(ViolationSignalType::NoFace), 1);
        assert_eq!(agg.record_event(ViolationSignalType::NoFace), 2);
        assert_eq!(agg.counts().no_face, 2);
        assert_eq!(agg.counts().cell_phone, 0);
    }

    #[test]
    fn test_record_named_rejects_unknown_type() {
        let mut agg = aggregator();
        assert_eq!(agg.record_named("cellPhone"), Ok(1));
        assert!(agg.record_named("smartWatch").is_err());
        assert_eq!(agg.counts().total(), 1);
    }

    #[test]
    fn test_counts_are_monotonic_under_mixed_updates() {
        let mut agg = aggregator();
        let mut previous = *agg.counts();

        let updates = [
            LogUpdate::focus_total(3),
            LogUpdate::focus_total(1),
            LogUpdate::detector_delta(ViolationCounts { no_face: 2, ..Default::default() }),
            LogUpdate::focus_total(0),
        ];

        for update in &updates {
            agg.merge(update);
            assert!(agg.counts().dominates(&previous));
            previous = *agg.counts();
            agg.record_event(ViolationSignalType::CellPhone);
            assert!(agg.counts().dominates(&previous));
            previous = *agg.counts();
        }
    }

    #[test]
    fn test_additive_merge_sums() {
        let mut agg = aggregator();
        agg.record_event(ViolationSignalType::MultipleFace);
        agg.merge(&LogUpdate::detector_delta(ViolationCounts {
            multiple_face: 2,
            ..Default::default()
        }));
        assert_eq!(agg.counts().multiple_face, 3);
    }

    #[test]
    fn test_cumulative_merge_takes_max() {
        let mut agg = aggregator();
        agg.merge(&LogUpdate::focus_total(4));
        // Same total re-sent (double submission) is not double counted
        agg.merge(&LogUpdate::focus_total(4));
        assert_eq!(agg.counts().focus_lost, 4);
        agg.merge(&LogUpdate::focus_total(2));
        assert_eq!(agg.counts().focus_lost, 4);
    }

    #[test]
    fn test_update_drops_fields_not_owned_by_source() {
        let update = LogUpdate::new(
            UpdateSource::Focus,
            MergePolicy::Additive,
            ViolationCounts { focus_lost: 1, cell_phone: 9, ..Default::default() },
        );
        assert_eq!(update.counts().cell_phone, 0);
        assert_eq!(update.counts().focus_lost, 1);

        let update = LogUpdate::detector_delta(ViolationCounts { focus_lost: 5, ..Default::default() });
        assert_eq!(update.counts().focus_lost, 0);
    }

    #[test]
    fn test_normalize_flat_legacy_shape() {
        let raw = json!({
            "noFaceCount": 2,
            "multipleFaceCount": "3",
            "cellPhoneCount": null,
            "prohibitedObjectCount": -4,
            "focusLostCount": 1.9,
            "examId": "exam-1"
        });
        let counts = normalize_counts(&raw);
        assert_eq!(counts.no_face, 2);
        assert_eq!(counts.multiple_face, 3);
        assert_eq!(counts.cell_phone, 0);
        assert_eq!(counts.prohibited_object, 0);
        assert_eq!(counts.focus_lost, 1);
    }

    #[test]
    fn test_normalize_nested_shape_and_garbage() {
        let raw = json!({ "counts": { "cellPhone": 5, "noFace": "abc", "focusLost": true } });
        let counts = normalize_counts(&raw);
        assert_eq!(counts.cell_phone, 5);
        assert_eq!(counts.no_face, 0);
        assert_eq!(counts.focus_lost, 0);

        assert!(normalize_counts(&json!(null)).is_zero());
        assert!(normalize_counts(&json!([1, 2, 3])).is_zero());
    }

    #[test]
    fn test_from_raw_merges_normalized_values() {
        let mut agg = aggregator();
        let update = LogUpdate::from_raw(
            UpdateSource::Detector,
            MergePolicy::Additive,
            &json!({ "noFaceCount": "2", "cellPhoneCount": -1 }),
        );
        agg.merge(&update);
        assert_eq!(agg.counts().no_face, 2);
        assert_eq!(agg.counts().cell_phone, 0);
    }

    #[test]
    fn test_evidence_never_exceeds_counts() {
        let mut agg = aggregator();

        assert!(!agg.attach_evidence(evidence(ViolationSignalType::CellPhone)));
        agg.record_event(ViolationSignalType::CellPhone);
        assert!(agg.attach_evidence(evidence(ViolationSignalType::CellPhone)));
        assert!(!agg.attach_evidence(evidence(ViolationSignalType::CellPhone)));

        assert_eq!(agg.rejected_evidence(), 2);
        assert!(agg.log().evidence_within_counts());
    }

    #[test]
    fn test_evidence_keeps_arrival_order() {
        let mut agg = aggregator();
        agg.record_event(ViolationSignalType::NoFace);
        agg.record_event(ViolationSignalType::CellPhone);

        agg.attach_evidence(evidence(ViolationSignalType::CellPhone));
        agg.attach_evidence(evidence(ViolationSignalType::NoFace));

        let kinds: Vec<_> = agg.log().evidence.iter().map(|e| e.signal_type).collect();
        assert_eq!(kinds, vec![ViolationSignalType::CellPhone, ViolationSignalType::NoFace]);
    }
}
