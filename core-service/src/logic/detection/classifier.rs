//! Event Classifier
//!
//! Stateless mapping from a detection frame (or a focus transition) to
//! candidate violation signals. No side effects.

use chrono::{DateTime, Utc};

use super::types::{
    CandidateSignal, DetectionFrame, FocusTransition, ViolationSignalType, CELL_PHONE_LABEL,
    PERSON_LABEL, PROHIBITED_OBJECT_LABELS,
};

/// Detections below this confidence are ignored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    pub min_confidence: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        // The detector already applies its own score cut-off
        Self { min_confidence: 0.0 }
    }
}

// ============================================================================
// FRAME CLASSIFICATION
// ============================================================================

/// Classify a frame with default thresholds
pub fn classify_frame(frame: &DetectionFrame) -> Vec<CandidateSignal> {
    classify_frame_with_thresholds(frame, &ClassifierThresholds::default())
}

pub fn classify_frame_with_thresholds(
    frame: &DetectionFrame,
    thresholds: &ClassifierThresholds,
) -> Vec<CandidateSignal> {
    let min = thresholds.min_confidence;
    let at = frame.timestamp;
    let mut signals = Vec::new();

    // NoFace and MultipleFace are mutually exclusive by construction
    match frame.count_label(PERSON_LABEL, min) {
        0 => signals.push(CandidateSignal::new(ViolationSignalType::NoFace, at)),
        1 => {}
        _ => signals.push(CandidateSignal::new(ViolationSignalType::MultipleFace, at)),
    }

    if frame.has_label(CELL_PHONE_LABEL, min) {
        signals.push(CandidateSignal::new(ViolationSignalType::CellPhone, at));
    }

    if PROHIBITED_OBJECT_LABELS.iter().any(|l| frame.has_label(l, min)) {
        signals.push(CandidateSignal::new(ViolationSignalType::ProhibitedObject, at));
    }

    signals
}

// ============================================================================
// FOCUS CLASSIFICATION
// ============================================================================

/// Tab hidden / window blur become `FocusLost`; regaining focus is ignored
pub fn classify_focus(transition: FocusTransition, at: DateTime<Utc>) -> Option<CandidateSignal> {
    transition
        .is_focus_lost()
        .then(|| CandidateSignal::new(ViolationSignalType::FocusLost, at))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::detection::types::Detection;

    fn frame(labels: &[&str]) -> DetectionFrame {
        DetectionFrame::new(
            Utc::now(),
            labels.iter().map(|l| Detection::new(l, 0.9)).collect(),
        )
    }

    fn types(signals: &[CandidateSignal]) -> Vec<ViolationSignalType> {
        signals.iter().map(|s| s.signal_type).collect()
    }

    #[test]
    fn test_single_person_is_clean() {
        assert!(classify_frame(&frame(&["person"])).is_empty());
    }

    #[test]
    fn test_empty_frame_is_no_face() {
        assert_eq!(types(&classify_frame(&frame(&[]))), vec![ViolationSignalType::NoFace]);
    }

    #[test]
    fn test_multiple_face_fires_once_per_frame() {
        let signals = classify_frame(&frame(&["person", "person", "person", "person"]));
        assert_eq!(types(&signals), vec![ViolationSignalType::MultipleFace]);
    }

    #[test]
    fn test_multiple_face_and_phone_co_occur() {
        let signals = classify_frame(&frame(&["person", "cell phone", "person"]));
        assert_eq!(
            types(&signals),
            vec![ViolationSignalType::MultipleFace, ViolationSignalType::CellPhone]
        );
    }

    #[test]
    fn test_book_and_laptop_are_one_prohibited_object() {
        let signals = classify_frame(&frame(&["person", "book", "laptop"]));
        assert_eq!(types(&signals), vec![ViolationSignalType::ProhibitedObject]);
    }

    #[test]
    fn test_phone_without_person_yields_both() {
        let signals = classify_frame(&frame(&["cell phone"]));
        assert_eq!(
            types(&signals),
            vec![ViolationSignalType::NoFace, ViolationSignalType::CellPhone]
        );
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let signals = classify_frame(&frame(&["Person", "Cell Phone"]));
        assert_eq!(types(&signals), vec![ViolationSignalType::CellPhone]);
    }

    #[test]
    fn test_threshold_filters_weak_detections() {
        let f = DetectionFrame::new(
            Utc::now(),
            vec![Detection::new("person", 0.9), Detection::new("cell phone", 0.2)],
        );
        let thresholds = ClassifierThresholds { min_confidence: 0.5 };
        assert!(classify_frame_with_thresholds(&f, &thresholds).is_empty());
    }

    #[test]
    fn test_signals_carry_frame_timestamp() {
        let f = frame(&[]);
        let signals = classify_frame(&f);
        assert_eq!(signals[0].at, f.timestamp);
    }

    #[test]
    fn test_focus_transitions() {
        let now = Utc::now();
        assert_eq!(
            classify_focus(FocusTransition::TabHidden, now).map(|s| s.signal_type),
            Some(ViolationSignalType::FocusLost)
        );
        assert!(classify_focus(FocusTransition::WindowBlur, now).is_some());
        assert!(classify_focus(FocusTransition::TabVisible, now).is_none());
        assert!(classify_focus(FocusTransition::WindowFocus, now).is_none());
    }
}
