//! Page windows for list endpoints

use serde::{Deserialize, Serialize};

/// A 1-based page of `limit` rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self { Self { page: page.max(1), limit: limit.max(1) } }

    /// Lenient parsing of raw query values: anything unusable falls back to the defaults and
    /// the limit is capped at `max_limit`.
    pub fn parse(page: Option<&str>, limit: Option<&str>, default_limit: u32, max_limit: u32) -> Self {
        let page = page.and_then(|p| p.trim().parse::<u32>().ok()).filter(|p| *p >= 1).unwrap_or(1);
        let limit = match limit.and_then(|l| l.trim().parse::<u32>().ok()).filter(|l| *l >= 1) {
            Some(l) => l.min(max_limit),
            None => default_limit,
        };
        Self::new(page, limit)
    }

    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.limit) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        let limit = i64::from(page.limit);
        Self { data, total, page: page.page, limit: page.limit, total_pages: (total + limit - 1) / limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        assert_eq!(Page::parse(None, None, 10, 30), Page { page: 1, limit: 10 });
        assert_eq!(Page::parse(Some("abc"), Some("-3"), 10, 30), Page { page: 1, limit: 10 });
        assert_eq!(Page::parse(Some("0"), Some("0"), 10, 30), Page { page: 1, limit: 10 });
    }

    #[test]
    fn test_parse_caps_limit() {
        assert_eq!(Page::parse(Some("3"), Some("100"), 10, 30), Page { page: 3, limit: 30 });
        assert_eq!(Page::parse(Some("2"), Some("5"), 10, 30), Page { page: 2, limit: 5 });
    }

    #[test]
    fn test_offset() {
        assert_eq!(Page::new(1, 10).offset(), 0);
        assert_eq!(Page::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(Paginated::new(vec![1, 2], 21, Page::new(1, 10)).total_pages, 3);
        assert_eq!(Paginated::<i32>::new(vec![], 0, Page::new(1, 10)).total_pages, 0);
        assert_eq!(Paginated::new(vec![1], 10, Page::new(1, 10)).total_pages, 1);
    }
}
