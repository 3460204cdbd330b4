//! Pagination request and result.

use serde::{Deserialize, Serialize};

const DEFAULT_CURRENT: i64 = 1;
const DEFAULT_SIZE: i64 = 10;

/// One page of records.
///
/// Serializes as `{"page", "pageSize", "total", "list", "curTime"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// 1-based page number.
    #[serde(rename = "page")]
    pub current: i64,
    #[serde(rename = "pageSize")]
    pub size: i64,
    /// Matching rows across all pages; left at 0 when counting is skipped.
    pub total: i64,
    #[serde(rename = "list")]
    pub records: Vec<T>,
    /// Unix milliseconds when the page was filled.
    #[serde(rename = "curTime")]
    pub cur_time: i64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

impl<T> Page<T> {
    /// Non-positive values default to page 1 and size 10.
    pub fn new(current: i64, size: i64) -> Self {
        let mut page = Self {
            current,
            size,
            total: 0,
            records: Vec::new(),
            cur_time: 0,
        };
        page.normalize();
        page
    }

    /// Reapply the page 1 / size 10 defaults, e.g. after deserializing a request.
    pub fn normalize(&mut self) -> &mut Self {
        if self.current <= 0 {
            self.current = DEFAULT_CURRENT;
        }
        if self.size <= 0 {
            self.size = DEFAULT_SIZE;
        }
        self
    }

    /// Rows per page, with the default applied.
    pub fn limit(&self) -> i64 {
        if self.size <= 0 { DEFAULT_SIZE } else { self.size }
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> i64 {
        (self.current.max(DEFAULT_CURRENT) - 1) * self.limit()
    }

    /// Number of pages for the current total.
    pub fn pages(&self) -> i64 {
        if self.size <= 0 {
            return 0;
        }
        (self.total + self.size - 1) / self.size
    }

    pub(crate) fn fill(&mut self, records: Vec<T>) {
        self.records = records;
        self.cur_time = chrono::Utc::now().timestamp_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_non_positive_values() {
        let page = Page::<()>::new(0, -5);
        assert_eq!((page.current, page.size), (1, 10));
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn deserialized_page_is_normalized() {
        let mut page: Page<()> =
            serde_json::from_value(serde_json::json!({"page": 0, "pageSize": -5, "total": 0, "list": [], "curTime": 0}))
                .unwrap();
        assert_eq!(page.limit(), 10);
        assert_eq!(page.offset(), 0);

        page.current = 3;
        page.size = 0;
        assert_eq!(page.offset(), 20);

        page.normalize();
        assert_eq!((page.current, page.size), (3, 10));
    }

    #[test]
    fn offset_from_current_and_size() {
        assert_eq!(Page::<()>::new(2, 10).offset(), 10);
        assert_eq!(Page::<()>::new(4, 25).offset(), 75);
    }

    #[test]
    fn pages_rounds_up() {
        let mut page = Page::<()>::new(1, 10);
        page.total = 25;
        assert_eq!(page.pages(), 3);
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut page = Page::new(2, 2);
        page.total = 3;
        page.records = vec![1, 2];
        page.cur_time = 7;
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"page": 2, "pageSize": 2, "total": 3, "list": [1, 2], "curTime": 7})
        );
    }
}
