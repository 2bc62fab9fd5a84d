pub mod classes;
pub mod places;
pub mod timetables;
