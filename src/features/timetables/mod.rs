//! Weekly opening-hours timetables.
//!
//! Each place stores a small set of non-overlapping intervals in
//! week-space minutes (Monday 00:00 = 0). Window matching is
//! wraparound-aware; storage never wraps.

pub mod models;
pub mod services;

pub use services::TimetableService;
