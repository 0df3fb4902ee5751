//! Integrity Scoring Rules
//!
//! Deduction weights only. No scoring logic here.

use serde::{Deserialize, Serialize};

// ============================================================================
// WEIGHTS (points deducted per confirmed occurrence)
// ============================================================================

pub const FOCUS_LOST_WEIGHT: u64 = 2;

pub const MULTIPLE_FACES_WEIGHT: u64 = 10;

pub const NO_FACE_WEIGHT: u64 = 3;

pub const PHONE_WEIGHT: u64 = 15;

/// Books, laptops and other prohibited material
pub const NOTES_WEIGHT: u64 = 10;

/// Starting score; zero violations cannot exceed it
pub const MAX_SCORE: u64 = 100;

// ============================================================================
// CONFIGURABLE WEIGHTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    pub focus_lost: u64,
    pub multiple_faces: u64,
    pub no_face_detected: u64,
    pub phone_detected: u64,
    pub notes_detected: u64,
    pub max_score: u64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            focus_lost: FOCUS_LOST_WEIGHT,
            multiple_faces: MULTIPLE_FACES_WEIGHT,
            no_face_detected: NO_FACE_WEIGHT,
            phone_detected: PHONE_WEIGHT,
            notes_detected: NOTES_WEIGHT,
            max_score: MAX_SCORE,
        }
    }
}
