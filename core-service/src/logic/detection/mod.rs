//! Detection Module
//!
//! ## Structure
//! - `types.rs` - DetectionFrame, ViolationSignalType, DetectionSource trait
//! - `classifier.rs` - Frame / focus transition -> candidate signals (pure)
//! - `debounce.rs` - Per-type cooldown -> confirmed ViolationEvents

pub mod types;
pub mod classifier;
pub mod debounce;

pub use types::{
    BoundingBox, CandidateSignal, Detection, DetectionError, DetectionFrame, DetectionSource,
    FocusTransition, FrameImage, ViolationEvent, ViolationSignalType,
};
pub use classifier::{classify_focus, classify_frame, classify_frame_with_thresholds, ClassifierThresholds};
pub use debounce::Debouncer;
