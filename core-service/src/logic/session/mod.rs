//! Session Module
//!
//! Exam sessions as explicitly owned tasks addressed by a `SessionId`.
//!
//! ## Structure
//! - `runtime`: the per-session loop (sampling, focus, evidence, teardown)
//! - `manager`: start / current log / merge / submit / release
//!
//! ## Usage
//! ```ignore
//! let id = manager.start_session("exam-1", candidate, Box::new(camera), focus_rx)?;
//! let live = manager.current_log(id)?;
//! let submission = manager.submit_session(id).await?;
//! ```

pub mod manager;
pub mod runtime;

pub use manager::{SessionManager, FOCUS_BUFFER};
pub use runtime::{SessionCommand, Submission};
