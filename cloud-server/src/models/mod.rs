//! Data models

pub mod proctoring_report;
pub mod cheating_log;

pub use proctoring_report::*;
pub use cheating_log::*;
