use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Standard pagination parameters for all list operations.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationQuery {
    /// Page number (1-indexed, default: 1)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Number of items per page (default: 10, max: 100)
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationQuery {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// Calculate SQL OFFSET from page number
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    /// Get clamped page_size (respects MAX_PAGE_SIZE)
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Fetch size for over-fetch-by-one next-page detection
    pub fn fetch_limit(&self) -> i64 {
        self.limit() + 1
    }
}

/// One page of results with next-page detection and the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Builds a page from rows fetched with [`PaginationQuery::fetch_limit`].
    ///
    /// Exactly `limit + 1` rows back means a further page exists; the
    /// extra row is dropped.
    pub fn from_overfetched(mut rows: Vec<T>, limit: i64, total: i64) -> Self {
        let has_next = rows.len() as i64 > limit;
        if has_next {
            rows.truncate(limit as usize);
        }
        Self {
            items: rows,
            total,
            has_next,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            has_next: self.has_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit_clamping() {
        let q = PaginationQuery::new(3, 20);
        assert_eq!(q.limit(), 20);
        assert_eq!(q.offset(), 40);
        assert_eq!(q.fetch_limit(), 21);

        let oversized = PaginationQuery::new(1, 500);
        assert_eq!(oversized.limit(), MAX_PAGE_SIZE);

        let zero = PaginationQuery::new(0, 0);
        assert_eq!(zero.limit(), 1);
        assert_eq!(zero.offset(), 0);
    }

    #[test]
    fn test_page_overfetch_detects_next() {
        let page = Page::from_overfetched(vec![1, 2, 3, 4], 3, 10);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(page.has_next);
        assert_eq!(page.total, 10);
    }

    #[test]
    fn test_page_overfetch_last_page() {
        let page = Page::from_overfetched(vec![1, 2], 3, 5);
        assert_eq!(page.items, vec![1, 2]);
        assert!(!page.has_next);
    }

    #[test]
    fn test_page_count_arithmetic() {
        // 10 rows, size 3 -> pages of 3, 3, 3, 1
        let total = 10i64;
        let size = 3i64;
        let mut seen = 0;
        let mut pages = 0;
        loop {
            let remaining = (total - seen).min(size);
            if remaining == 0 {
                break;
            }
            let rows: Vec<i64> = (0..(remaining + 1).min(total - seen)).collect();
            let page = Page::from_overfetched(rows, size, total);
            seen += page.items.len() as i64;
            pages += 1;
            if !page.has_next {
                break;
            }
        }
        assert_eq!(pages, 4);
        assert_eq!(seen, total);
    }
}
