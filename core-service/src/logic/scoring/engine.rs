//! Integrity Scoring Engine
//!
//! Pure function of the final counts. Same counts in, same score out,
//! whatever order the events arrived in.

use serde::{Deserialize, Serialize};

use super::rules::ScoringWeights;
use crate::logic::cheating_log::{CheatingLog, ViolationCounts};

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// Points deducted per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deductions {
    pub focus_lost: u64,
    pub multiple_faces: u64,
    pub no_face_detected: u64,
    pub phone_detected: u64,
    pub notes_detected: u64,
}

impl Deductions {
    pub fn total(&self) -> u64 {
        self.focus_lost
            .saturating_add(self.multiple_faces)
            .saturating_add(self.no_face_detected)
            .saturating_add(self.phone_detected)
            .saturating_add(self.notes_detected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityAssessment {
    pub deductions: Deductions,
    pub total_deductions: u64,
    /// 0..=100
    pub integrity_score: u32,
    pub duration_minutes: i64,
}

// ============================================================================
// SCORING
// ============================================================================

/// Score with the default weights
pub fn score(counts: &ViolationCounts, duration_minutes: i64) -> IntegrityAssessment {
    score_with_weights(counts, duration_minutes, &ScoringWeights::default())
}

pub fn score_log(log: &CheatingLog, duration_minutes: i64) -> IntegrityAssessment {
    score(&log.counts, duration_minutes)
}

pub fn score_with_weights(
    counts: &ViolationCounts,
    duration_minutes: i64,
    weights: &ScoringWeights,
) -> IntegrityAssessment {
    let deduct = |count: u32, weight: u64| (count as u64).saturating_mul(weight);

    let deductions = Deductions {
        focus_lost: deduct(counts.focus_lost, weights.focus_lost),
        multiple_faces: deduct(counts.multiple_face, weights.multiple_faces),
        no_face_detected: deduct(counts.no_face, weights.no_face_detected),
        phone_detected: deduct(counts.cell_phone, weights.phone_detected),
        notes_detected: deduct(counts.prohibited_object, weights.notes_detected),
    };

    let total_deductions = deductions.total();
    let integrity_score = weights.max_score.saturating_sub(total_deductions);

    IntegrityAssessment {
        deductions,
        total_deductions,
        integrity_score: integrity_score.min(u32::MAX as u64) as u32,
        duration_minutes,
    }
}

// ============================================================================
// TESTS
// ============================================================================
