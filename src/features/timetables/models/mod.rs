mod timetable;

pub use timetable::{IntervalParams, TimeWindow, TimetableInterval};
