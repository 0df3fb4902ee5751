//! HTTP handlers

pub mod health;
pub mod proctoring_reports;
pub mod cheating_logs;
