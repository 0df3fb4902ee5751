//! Detection Types
//!
//! Data handed over by the external detector plus the closed set of
//! violation signal types. No logic beyond small accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::logic::cheating_log::SessionId;
use crate::logic::error::ProctorError;

// ============================================================================
// LABELS
// ============================================================================

pub const PERSON_LABEL: &str = "person";
pub const CELL_PHONE_LABEL: &str = "cell phone";
pub const PROHIBITED_OBJECT_LABELS: [&str; 2] = ["book", "laptop"];

// ============================================================================
// DETECTION FRAME
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One labeled detection in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    #[serde(default, rename = "boundingBox")]
    pub bounding_box: BoundingBox,
}

impl Detection {
    pub fn new(label: &str, confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            confidence,
            bounding_box: BoundingBox::default(),
        }
    }

    /// Case-insensitive label match
    pub fn is(&self, label: &str) -> bool {
        self.label.trim().eq_ignore_ascii_case(label)
    }
}

/// Detections for a single sampling tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl DetectionFrame {
    pub fn new(timestamp: DateTime<Utc>, detections: Vec<Detection>) -> Self {
        Self { timestamp, detections }
    }

    /// Number of detections carrying `label` at or above `min_confidence`
    pub fn count_label(&self, label: &str, min_confidence: f32) -> usize {
        self.detections
            .iter()
            .filter(|d| d.is(label) && d.confidence >= min_confidence)
            .count()
    }

    pub fn has_label(&self, label: &str, min_confidence: f32) -> bool {
        self.count_label(label, min_confidence) > 0
    }
}

/// Raw video frame used as evidence
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    /// Encoded JPEG bytes
    pub data: Vec<u8>,
}

impl FrameImage {
    /// A surface is ready once it has non-zero dimensions and a decoded frame
    pub fn is_ready(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }
}

// ============================================================================
// FOCUS TRANSITIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FocusTransition {
    TabHidden,
    TabVisible,
    WindowBlur,
    WindowFocus,
}

impl FocusTransition {
    pub fn is_focus_lost(&self) -> bool {
        matches!(self, Self::TabHidden | Self::WindowBlur)
    }
}

// ============================================================================
// VIOLATION SIGNALS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationSignalType {
    NoFace,
    MultipleFace,
    CellPhone,
    ProhibitedObject,
    FocusLost,
}

impl ViolationSignalType {
    pub const ALL: [ViolationSignalType; 5] = [
        Self::NoFace,
        Self::MultipleFace,
        Self::CellPhone,
        Self::ProhibitedObject,
        Self::FocusLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFace => "noFace",
            Self::MultipleFace => "multipleFace",
            Self::CellPhone => "cellPhone",
            Self::ProhibitedObject => "prohibitedObject",
            Self::FocusLost => "focusLost",
        }
    }

    /// Warning title shown to the candidate
    pub fn title(&self) -> &'static str {
        match self {
            Self::NoFace => "Face Not Visible",
            Self::MultipleFace => "Multiple Faces Detected",
            Self::CellPhone => "Cell Phone Detected",
            Self::ProhibitedObject => "Prohibited Object Detected",
            Self::FocusLost => "Focus Lost",
        }
    }

    /// Focus loss is not subject to the shared cooldown
    pub fn is_debounced(&self) -> bool {
        !matches!(self, Self::FocusLost)
    }

    /// A camera frame says nothing about a tab switch
    pub fn captures_evidence(&self) -> bool {
        !matches!(self, Self::FocusLost)
    }
}

impl fmt::Display for ViolationSignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationSignalType {
    type Err = ProctorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProctorError::UnknownViolationType(s.to_string()))
    }
}

/// A raw, possibly over-firing indication from one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSignal {
    pub signal_type: ViolationSignalType,
    pub at: DateTime<Utc>,
}

impl CandidateSignal {
    pub fn new(signal_type: ViolationSignalType, at: DateTime<Utc>) -> Self {
        Self { signal_type, at }
    }
}

/// A debounced, confirmed occurrence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationEvent {
    #[serde(rename = "type")]
    pub signal_type: ViolationSignalType,
    pub occurred_at: DateTime<Utc>,
    pub session_id: SessionId,
}

// ============================================================================
// DETECTION SOURCE (external collaborator)
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectionError {
    /// Camera permission denied, model failed to load, ...
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    /// A single tick could not be sampled
    #[error("frame sampling failed: {0}")]
    Frame(String),
}

/// Frame-by-frame detector treated as a black box
pub trait DetectionSource: Send {
    /// Prepare the device; failure is fatal to the session
    fn start(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }

    /// Detections for the current frame
    fn sample(&mut self) -> Result<DetectionFrame, DetectionError>;

    /// Current raw frame, if the capture surface has one
    fn snapshot(&self) -> Option<FrameImage>;

    /// Release the device
    fn stop(&mut self) {}
}
