/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Upper bound on timetable intervals stored per place
pub const MAX_INTERVALS_PER_PLACE: usize = 21;

/// Upper bound on class hierarchy depth walked during cycle checks
pub const MAX_HIERARCHY_DEPTH: usize = 64;

/// Separator between codes in the materialized class path
pub const PATH_SEPARATOR: char = '.';
