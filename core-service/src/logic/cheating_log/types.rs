//! Cheating Log Types
//!
//! Per-session aggregate of confirmed violation counts and evidence.
//! Field names are the persisted contract read by review tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::logic::detection::ViolationSignalType;
use crate::logic::error::{ProctorError, ProctorResult};

// ============================================================================
// SESSION ID
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// CANDIDATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub name: String,
    pub email: String,
}

impl CandidateIdentity {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        }
    }

    /// Name and email are both required
    pub fn validate(&self) -> ProctorResult<()> {
        if self.name.trim().is_empty() {
            return Err(ProctorError::MissingIdentity("candidate name"));
        }
        if self.email.trim().is_empty() {
            return Err(ProctorError::MissingIdentity("candidate email"));
        }
        Ok(())
    }
}

// ============================================================================
// COUNTS
// ============================================================================

/// Count per violation type. Closed set, so a struct rather than a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViolationCounts {
    pub no_face: u32,
    pub multiple_face: u32,
    pub cell_phone: u32,
    pub prohibited_object: u32,
    pub focus_lost: u32,
}

impl ViolationCounts {
    pub fn get(&self, kind: ViolationSignalType) -> u32 {
        match kind {
            ViolationSignalType::NoFace => self.no_face,
            ViolationSignalType::MultipleFace => self.multiple_face,
            ViolationSignalType::CellPhone => self.cell_phone,
            ViolationSignalType::ProhibitedObject => self.prohibited_object,
            ViolationSignalType::FocusLost => self.focus_lost,
        }
    }

    fn slot(&mut self, kind: ViolationSignalType) -> &mut u32 {
        match kind {
            ViolationSignalType::NoFace => &mut self.no_face,
            ViolationSignalType::MultipleFace => &mut self.multiple_face,
            ViolationSignalType::CellPhone => &mut self.cell_phone,
            ViolationSignalType::ProhibitedObject => &mut self.prohibited_object,
            ViolationSignalType::FocusLost => &mut self.focus_lost,
        }
    }

    /// +1, saturating. Returns the new value.
    pub fn increment(&mut self, kind: ViolationSignalType) -> u32 {
        let slot = self.slot(kind);
        *slot = slot.saturating_add(1);
        *slot
    }

    pub fn set(&mut self, kind: ViolationSignalType, value: u32) {
        *self.slot(kind) = value;
    }

    pub fn total(&self) -> u64 {
        ViolationSignalType::ALL
            .iter()
            .map(|t| self.get(*t) as u64)
            .sum()
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }

    /// Field-wise saturating sum
    pub fn sum(&self, other: &ViolationCounts) -> ViolationCounts {
        let mut out = *self;
        for kind in ViolationSignalType::ALL {
            out.set(kind, self.get(kind).saturating_add(other.get(kind)));
        }
        out
    }

    /// Field-wise maximum
    pub fn max(&self, other: &ViolationCounts) -> ViolationCounts {
        let mut out = *self;
        for kind in ViolationSignalType::ALL {
            out.set(kind, self.get(kind).max(other.get(kind)));
        }
        out
    }

    /// Every field of `self` is >= the same field of `other`
    pub fn dominates(&self, other: &ViolationCounts) -> bool {
        ViolationSignalType::ALL
            .iter()
            .all(|t| self.get(*t) >= other.get(*t))
    }
}

// ============================================================================
// EVIDENCE
// ============================================================================

/// Uploaded snapshot correlated with a confirmed violation (best-effort)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    pub url: String,
    #[serde(rename = "type")]
    pub signal_type: ViolationSignalType,
    pub detected_at: DateTime<Utc>,
}

// ============================================================================
// CHEATING LOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheatingLog {
    pub session_id: SessionId,
    pub candidate_identity: CandidateIdentity,
    pub exam_id: String,
    pub counts: ViolationCounts,
    /// Upload-completion order, not occurrence order
    #[serde(default)]
    pub evidence: Vec<EvidenceRecord>,
}

impl CheatingLog {
    /// Fresh log with all counts at zero
    pub fn new(session_id: SessionId, exam_id: &str, candidate: CandidateIdentity) -> Self {
        Self {
            session_id,
            candidate_identity: candidate,
            exam_id: exam_id.trim().to_string(),
            counts: ViolationCounts::default(),
            evidence: Vec::new(),
        }
    }

    pub fn validate(&self) -> ProctorResult<()> {
        if self.exam_id.trim().is_empty() {
            return Err(ProctorError::MissingIdentity("exam id"));
        }
        self.candidate_identity.validate()
    }

    pub fn evidence_of(&self, kind: ViolationSignalType) -> usize {
        self.evidence.iter().filter(|e| e.signal_type == kind).count()
    }

    /// `counts[t] >= |evidence of type t|` for every t
    pub fn evidence_within_counts(&self) -> bool {
        ViolationSignalType::ALL
            .iter()
            .all(|t| self.evidence_of(*t) <= self.counts.get(*t) as usize)
    }
}
