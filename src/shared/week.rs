//! Week-space time math for opening-hours intervals.
//!
//! A week-space minute is an integer in `[0, 10080)` counting from
//! Monday 00:00. Stored intervals never wrap; query windows may
//! (`start > end` means the end lies in the following week) and are
//! split at the boundary before matching.

/// Minutes in a 7-day week
pub const WEEK_MINUTES: i32 = 10_080;

/// Maps an arbitrary minute value into `[0, WEEK_MINUTES)`.
pub fn normalize_minute(minute: i32) -> i32 {
    minute.rem_euclid(WEEK_MINUTES)
}

/// Half-open segment in week space, `start < end`, no wrapping.
pub type Segment = (i32, i32);

/// Splits a (possibly wrapping) window into non-wrapping segments.
///
/// Bounds are normalized first. A zero-length window yields no
/// segments; a wrapping window yields its two halves.
pub fn split_window(start: i32, end: i32) -> Vec<Segment> {
    let start = normalize_minute(start);
    let end = normalize_minute(end);

    if start == end {
        return Vec::new();
    }
    if start < end {
        return vec![(start, end)];
    }
    vec![(start, WEEK_MINUTES), (0, end)]
}

/// Half-open interval intersection
pub fn segments_intersect(a: Segment, b: Segment) -> bool {
    a.0 < b.1 && a.1 > b.0
}

/// True when a stored interval intersects the (possibly wrapping) window.
pub fn window_intersects(interval: Segment, window_start: i32, window_end: i32) -> bool {
    split_window(window_start, window_end)
        .into_iter()
        .any(|seg| segments_intersect(interval, seg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_minute() {
        assert_eq!(normalize_minute(0), 0);
        assert_eq!(normalize_minute(10_079), 10_079);
        assert_eq!(normalize_minute(10_080), 0);
        assert_eq!(normalize_minute(10_280), 200);
        assert_eq!(normalize_minute(-60), 10_020);
    }

    #[test]
    fn test_split_plain_window() {
        assert_eq!(split_window(540, 1020), vec![(540, 1020)]);
    }

    #[test]
    fn test_split_wrapping_window() {
        assert_eq!(split_window(10_000, 200), vec![(10_000, 10_080), (0, 200)]);
    }

    #[test]
    fn test_split_zero_length_window() {
        assert!(split_window(540, 540).is_empty());
        // full week cannot be expressed as a window: 10080 normalizes to 0
        assert!(split_window(0, 10_080).is_empty());
    }

    #[test]
    fn test_segments_touching_do_not_intersect() {
        assert!(!segments_intersect((0, 60), (60, 120)));
        assert!(segments_intersect((0, 61), (60, 120)));
    }

    #[test]
    fn test_wraparound_window_matching() {
        // window [10000, 200) == [10000,10080) u [0,200)
        assert!(window_intersects((10_050, 10_070), 10_000, 200));
        assert!(window_intersects((100, 300), 10_000, 200));
        assert!(window_intersects((9_000, 10_010), 10_000, 200));
        assert!(!window_intersects((200, 540), 10_000, 200));
        assert!(!window_intersects((5_000, 9_000), 10_000, 200));
    }

    #[test]
    fn test_zero_length_window_matches_nothing() {
        assert!(!window_intersects((0, WEEK_MINUTES - 1), 300, 300));
    }
}
