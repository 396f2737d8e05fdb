//! Clipstash - clipboard history with content-hash deduplication
//!
//! Captured text and file copies are stored in SQLite, one row per unique content
//! hash with an occurrence count. A capture policy enforces size and count limits,
//! and a retention sweep purges records past their age.

pub mod capture;
pub mod config;
pub mod content_detection;
pub mod database;
pub mod interface;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod search;
mod store;

pub use capture::{CaptureOutcome, CapturePolicy, CaptureRejection, CaptureReport, ClipboardSnapshot};
pub use interface::*;
pub use store::ClipboardStore;
