//! Shared pagination types for API query parameters.
//!
//! All list endpoints use offset-based pagination with `page` and `page_size`
//! parameters, 1-indexed, and report the total count and page count so the
//! dashboard can render pagers without a second request.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Default number of items to return per page.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Standard pagination parameters for list endpoints.
///
/// - `page`: 1-indexed page number (default: 1)
/// - `page_size`: items per page (default: 10, max: 100)
///
/// Both values are clamped, preventing zero-result queries and excessive
/// data fetching.
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Page number, 1-indexed (default: 1)
    #[param(default = 1, minimum = 1)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    /// Maximum number of items to return per page (default: 10, max: 100)
    #[param(default = 10, minimum = 1, maximum = 100)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page_size: Option<i64>,
}

impl Pagination {
    /// Get the page value, clamped to at least 1.
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Get the page size, clamped between 1 and MAX_PAGE_SIZE.
    #[inline]
    pub fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Number of rows to skip for the current page.
    #[inline]
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.page_size()
    }
}

/// Generic paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// The items for the current page
    pub data: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total_count: i64,
    /// Total number of pages at the current page size
    pub total_pages: i64,
    /// Current page (1-indexed)
    pub page: i64,
    /// Items per page
    pub page_size: i64,
}

impl<T: ToSchema> PaginatedResponse<T> {
    /// Create a new paginated response, deriving `total_pages` from the count
    pub fn new(data: Vec<T>, total_count: i64, page: i64, page_size: i64) -> Self {
        Self {
            data,
            total_count,
            total_pages: (total_count + page_size - 1) / page_size,
            page,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_page_size_clamping() {
        // Zero is clamped to 1
        let p = Pagination {
            page: None,
            page_size: Some(0),
        };
        assert_eq!(p.page_size(), 1);

        // Negative is clamped to 1
        let p = Pagination {
            page: None,
            page_size: Some(-5),
        };
        assert_eq!(p.page_size(), 1);

        // Over max is clamped to MAX_PAGE_SIZE
        let p = Pagination {
            page: None,
            page_size: Some(1000),
        };
        assert_eq!(p.page_size(), MAX_PAGE_SIZE);

        // Valid value passes through
        let p = Pagination {
            page: None,
            page_size: Some(50),
        };
        assert_eq!(p.page_size(), 50);
    }

    #[test]
    fn test_page_clamping_and_offset() {
        // Page below 1 is clamped
        let p = Pagination {
            page: Some(0),
            page_size: Some(10),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.offset(), 0);

        let p = Pagination {
            page: Some(3),
            page_size: Some(25),
        };
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_total_pages() {
        let r = PaginatedResponse::new(vec!["a".to_string(), "b".to_string()], 21, 1, 10);
        assert_eq!(r.total_pages, 3);

        let r: PaginatedResponse<String> = PaginatedResponse::new(vec![], 0, 1, 10);
        assert_eq!(r.total_pages, 0);

        let r = PaginatedResponse::new(vec!["a".to_string()], 10, 1, 10);
        assert_eq!(r.total_pages, 1);
    }
}
