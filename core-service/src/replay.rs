//! Trace Replay Source
//!
//! A `DetectionSource` backed by a recorded JSONL trace, one entry per line:
//!
//! ```text
//! {"kind":"frame","timestamp":"2024-05-01T09:00:00Z","detections":[{"label":"person","confidence":0.93}]}
//! {"kind":"focus","transition":"tabHidden"}
//! ```
//!
//! Frames keep their recorded timestamps, so debouncing is identical to the
//! live session whatever the replay speed.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::{mpsc, Notify};

use proctor_core::logic::detection::{
    DetectionError, DetectionFrame, DetectionSource, FocusTransition, FrameImage,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TraceEntry {
    Frame(DetectionFrame),
    Focus { transition: FocusTransition },
}

/// Parse a trace; blank lines and `#` comments are skipped
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEntry>> {
    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = serde_json::from_str(line)
            .with_context(|| format!("invalid trace entry on line {}", index + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

pub fn load_trace(path: &Path) -> Result<Vec<TraceEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open trace {}", path.display()))?;
    parse_trace(std::io::BufReader::new(file))
}

/// Focus transitions in the trace. A focus channel this large never fills,
/// so no transition is dropped however many precede a frame.
pub fn focus_entry_count(entries: &[TraceEntry]) -> usize {
    entries
        .iter()
        .filter(|e| matches!(e, TraceEntry::Focus { .. }))
        .count()
}

pub struct ReplaySource {
    entries: VecDeque<TraceEntry>,
    focus_tx: mpsc::Sender<FocusTransition>,
    finished: Arc<Notify>,
    exhausted: bool,
}

impl ReplaySource {
    pub fn new(entries: Vec<TraceEntry>, focus_tx: mpsc::Sender<FocusTransition>, finished: Arc<Notify>) -> Self {
        Self {
            entries: entries.into(),
            focus_tx,
            finished,
            exhausted: false,
        }
    }
}

impl DetectionSource for ReplaySource {
    /// Forwards focus entries up to the next frame, then returns that frame
    fn sample(&mut self) -> Result<DetectionFrame, DetectionError> {
        while let Some(entry) = self.entries.pop_front() {
            match entry {
                TraceEntry::Frame(frame) => return Ok(frame),
                TraceEntry::Focus { transition } => {
                    if let Err(e) = self.focus_tx.try_send(transition) {
                        log::warn!("Dropping replayed focus transition {:?}: {}", transition, e);
                    }
                }
            }
        }

        if !self.exhausted {
            self.exhausted = true;
            self.finished.notify_one();
        }
        Err(DetectionError::Frame("trace exhausted".to_string()))
    }

    fn snapshot(&self) -> Option<FrameImage> {
        None
    }
}
