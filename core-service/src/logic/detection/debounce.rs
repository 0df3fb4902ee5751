//! Debouncer
//!
//! Per-type cooldown over candidate signals. A candidate is confirmed only if
//! its type has not fired within the cooldown window; suppressed candidates
//! neither count nor move the window. `FocusLost` bypasses the cooldown.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use super::types::{CandidateSignal, ViolationEvent, ViolationSignalType};
use crate::constants::DEFAULT_COOLDOWN_MS;
use crate::logic::cheating_log::SessionId;

pub struct Debouncer {
    session_id: SessionId,
    cooldown: Duration,
    last_fired: HashMap<ViolationSignalType, DateTime<Utc>>,
    suppressed: u64,
}

impl Debouncer {
    pub fn new(session_id: SessionId) -> Self {
        Self::with_cooldown(session_id, Duration::milliseconds(DEFAULT_COOLDOWN_MS))
    }

    pub fn with_cooldown(session_id: SessionId, cooldown: Duration) -> Self {
        Self {
            session_id,
            cooldown,
            last_fired: HashMap::new(),
            suppressed: 0,
        }
    }

    /// Offer one candidate; returns the confirmed event, if any
    pub fn offer(&mut self, candidate: CandidateSignal) -> Option<ViolationEvent> {
        let kind = candidate.signal_type;

        if kind.is_debounced() {
            if let Some(last) = self.last_fired.get(&kind) {
                if candidate.at.signed_duration_since(*last) < self.cooldown {
                    self.suppressed += 1;
                    return None;
                }
            }
        }

        self.last_fired.insert(kind, candidate.at);

        Some(ViolationEvent {
            signal_type: kind,
            occurred_at: candidate.at,
            session_id: self.session_id,
        })
    }

    /// Offer a batch (one frame's worth) in order
    pub fn offer_all<I>(&mut self, candidates: I) -> Vec<ViolationEvent>
    where
        I: IntoIterator<Item = CandidateSignal>,
    {
        candidates.into_iter().filter_map(|c| self.offer(c)).collect()
    }

    pub fn last_fired(&self, kind: ViolationSignalType) -> Option<DateTime<Utc>> {
        self.last_fired.get(&kind).copied()
    }

    /// Candidates dropped inside a cooldown window so far
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
