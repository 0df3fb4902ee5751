//! Scoring Module
//!
//! Turns a finalized cheating log into a bounded 0-100 integrity score
//! with a per-category breakdown.
//!
//! ## Structure
//! - `rules`: deduction weights
//! - `engine`: the pure scoring function
//!
//! ## Usage
//! ```ignore
//! use crate::logic::scoring::score;
//!
//! let assessment = score(&log.counts, duration_minutes);
//! println!("{}", assessment.integrity_score);
//! ```

pub mod engine;
pub mod rules;

pub use engine::{score, score_log, score_with_weights, Deductions, IntegrityAssessment};
pub use rules::{ScoringWeights, MAX_SCORE};
