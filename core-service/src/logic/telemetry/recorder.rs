//! Proctoring Event Recorder
//!
//! Append-only JSONL writer. Thread-safe; every line is flushed on write.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;

use super::event::ProctorEvent;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Rotate once a file would exceed 50 MB
const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

const LOG_DIR: &str = "proctor_logs";

const LOG_EXT: &str = "jsonl";

// ============================================================================
// RECORDER STATE
// ============================================================================

static RECORDER: Mutex<Option<Recorder>> = Mutex::new(None);

static EVENTS_RECORDED: AtomicU64 = AtomicU64::new(0);

static STARTED_AT: Mutex<Option<Instant>> = Mutex::new(None);

// ============================================================================
// RECORDER
// ============================================================================

pub struct Recorder {
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_size: u64,
    max_file_size: u64,
    base_dir: PathBuf,
    sequence: u32,
}

impl Recorder {
    pub fn new(base_dir: PathBuf) -> std::io::Result<Self> {
        Self::with_max_size(base_dir, MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: PathBuf, max_file_size: u64) -> std::io::Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        let (file_path, file) = Self::open_new_file(&base_dir, 0)?;

        Ok(Self {
            writer: BufWriter::new(file),
            current_file: file_path,
            current_size: 0,
            max_file_size,
            base_dir,
            sequence: 0,
        })
    }

    /// `proctor_<yyyymmdd_hhmmss>_<seq>.jsonl`; the sequence keeps rotations
    /// within the same second apart
    fn open_new_file(base_dir: &Path, sequence: u32) -> std::io::Result<(PathBuf, File)> {
        let filename = format!(
            "proctor_{}_{:04}.{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            sequence,
            LOG_EXT
        );
        let file_path = base_dir.join(filename);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        log::info!("Opened proctoring log: {:?}", file_path);
        Ok((file_path, file))
    }

    pub fn record(&mut self, event: &ProctorEvent) -> std::io::Result<()> {
        let line = event.to_jsonl();
        let bytes = line.as_bytes();

        if self.current_size > 0 && self.current_size + bytes.len() as u64 + 1 > self.max_file_size {
            self.rotate()?;
        }

        self.writer.write_all(bytes)?;
        self.writer.write_all(b"\n")?;
        self.current_size += bytes.len() as u64 + 1;
        self.writer.flush()?;

        EVENTS_RECORDED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;

        self.sequence += 1;
        let (new_path, new_file) = Self::open_new_file(&self.base_dir, self.sequence)?;
        self.writer = BufWriter::new(new_file);

        log::info!("Rotated from {:?} to {:?}", self.current_file, new_path);
        self.current_file = new_path;
        self.current_size = 0;

        Ok(())
    }

    pub fn current_file(&self) -> &Path {
        &self.current_file
    }
}

// ============================================================================
// GLOBAL API
// ============================================================================

/// Default: `<data_local_dir>/proctor/proctor_logs`
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("proctor")
        .join(LOG_DIR)
}

/// Initialize the global recorder
pub fn init(base_dir: Option<PathBuf>) -> std::io::Result<()> {
    let recorder = Recorder::new(base_dir.unwrap_or_else(default_log_dir))?;
    *RECORDER.lock() = Some(recorder);
    *STARTED_AT.lock() = Some(Instant::now());

    record(ProctorEvent::agent_started(crate::constants::APP_VERSION));
    Ok(())
}

/// Record an event. Without an initialized recorder the event is only logged.
pub fn record(event: ProctorEvent) {
    let mut guard = RECORDER.lock();
    match guard.as_mut() {
        Some(recorder) => {
            if let Err(e) = recorder.record(&event) {
                log::error!("Failed to record proctoring event: {}", e);
            }
        }
        None => log::debug!("[telemetry] {}", event.description),
    }
}

pub fn events_recorded() -> u64 {
    EVENTS_RECORDED.load(Ordering::SeqCst)
}

pub fn current_log_file() -> Option<PathBuf> {
    RECORDER.lock().as_ref().map(|r| r.current_file().to_path_buf())
}

/// Flush and close the recorder
pub fn shutdown() {
    let uptime = STARTED_AT
        .lock()
        .take()
        .map(|t| t.elapsed().as_secs())
        .unwrap_or(0);

    let mut guard = RECORDER.lock();
    if let Some(mut recorder) = guard.take() {
        let _ = recorder.record(&ProctorEvent::agent_stopped(uptime));
        let _ = recorder.writer.flush();
        log::info!("Proctoring recorder shutdown. Total events: {}", events_recorded());
    }
}

// ============================================================================
// QUERY API
// ============================================================================

/// Read all events from a log file; malformed lines are skipped
pub fn read_events(file_path: &Path) -> std::io::Result<Vec<ProctorEvent>> {
    let reader = BufReader::new(File::open(file_path)?);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        if let Ok(event) = serde_json::from_str::<ProctorEvent>(&line) {
            events.push(event);
        }
    }

    Ok(events)
}

pub fn count_events_by_type(file_path: &Path) -> std::io::Result<HashMap<String, u64>> {
    let mut counts = HashMap::new();
    for event in read_events(file_path)? {
        *counts.entry(event.event_type.as_str().to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}

/// All `.jsonl` files in `dir`, oldest first
pub fn list_log_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if dir.is_dir() {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == LOG_EXT) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

// ============================================================================
// TESTS
// ============================================================================
