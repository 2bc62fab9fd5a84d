mod timetable_service;

pub use timetable_service::{validate_intervals, TimetableService};
