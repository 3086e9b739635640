//! Offset pagination shared by the list operations.

use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A validated page request.
///
/// Callers may send zero, negative or absurdly large values; they are clamped so that
/// `page >= 1` and `1 <= page_size <= max_page_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, page_size: Option<i64>, max_page_size: u64) -> Self {
        let max_page_size = max_page_size.max(1);
        let page = page.map_or(DEFAULT_PAGE, |p| p.max(1) as u64);
        let page_size = page_size
            .map_or(DEFAULT_PAGE_SIZE, |s| s.max(1) as u64)
            .min(max_page_size);
        Self { page, page_size }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of records before the first one on this page.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Paging metadata returned alongside list results.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// One page of results.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Slices an already filtered and ordered result set.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let skip = usize::try_from(request.skip()).unwrap_or(usize::MAX);
    let take = usize::try_from(request.page_size()).unwrap_or(usize::MAX);
    let data = items.into_iter().skip(skip).take(take).collect();

    Page {
        data,
        pagination: Pagination {
            page: request.page(),
            page_size: request.page_size(),
            total,
            total_pages: total.div_ceil(request.page_size()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_absent() {
        let request = PageRequest::new(None, None, 100);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 10);
        assert_eq!(request.skip(), 0);
    }

    #[test]
    fn non_positive_values_are_clamped() {
        let request = PageRequest::new(Some(-3), Some(0), 100);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 1);
    }

    #[test]
    fn page_size_is_capped() {
        let request = PageRequest::new(Some(1), Some(5_000), 100);
        assert_eq!(request.page_size(), 100);
    }

    #[test]
    fn second_page_of_twenty_five() {
        let items: Vec<u32> = (0..25).collect();
        let page = paginate(items, PageRequest::new(Some(2), Some(10), 100));
        assert_eq!(page.data, (10..20).collect::<Vec<_>>());
        assert_eq!(page.pagination.total, 25);
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let items: Vec<u32> = (0..5).collect();
        let page = paginate(items, PageRequest::new(Some(9), Some(10), 100));
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total, 5);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[test]
    fn empty_result_has_zero_pages() {
        let page = paginate(Vec::<u32>::new(), PageRequest::new(None, None, 100));
        assert_eq!(page.pagination.total_pages, 0);
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let page = paginate(vec![1, 2, 3], PageRequest::new(Some(i64::MAX), Some(100), 100));
        assert!(page.data.is_empty());
    }
}
