//! Shared pagination helpers: page math and pagination-metadata formatting.
//! Every list endpoint goes through these two functions.

use serde::{Deserialize, Serialize};

use crate::config;

/// Clamped paging inputs for a list query
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub per_page: i64,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

/// Pagination metadata included in list response envelopes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Normalize raw `page`/`per_page` query values.
///
/// Page numbers start at 1; per_page falls back to the configured default and
/// is capped at the configured maximum.
pub fn page_params(page: Option<i64>, per_page: Option<i64>) -> PageParams {
    let api = &config::config().api;
    clamp_page_params(page, per_page, api.default_page_size, api.max_page_size)
}

fn clamp_page_params(
    page: Option<i64>,
    per_page: Option<i64>,
    default_size: i64,
    max_size: i64,
) -> PageParams {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_size).clamp(1, max_size);
    PageParams { page, per_page }
}

/// Format pagination metadata from the params used and the COUNT total
pub fn pagination_meta(params: &PageParams, total: i64) -> Pagination {
    let total = total.max(0);
    // Ceiling division; per_page is clamped to >= 1 so this cannot divide by zero
    let total_pages = (total + params.per_page - 1) / params.per_page;
    Pagination {
        page: params.page,
        per_page: params.per_page,
        total,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamps() {
        let p = clamp_page_params(None, None, 20, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 20);

        let p = clamp_page_params(Some(0), Some(-5), 20, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 1);

        let p = clamp_page_params(Some(3), Some(500), 20, 100);
        assert_eq!(p.page, 3);
        assert_eq!(p.per_page, 100);
    }

    #[test]
    fn offset_follows_page() {
        let p = clamp_page_params(Some(3), Some(25), 20, 100);
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn metadata_matches_total() {
        let p = clamp_page_params(Some(2), Some(10), 20, 100);
        let meta = pagination_meta(&p, 35);
        assert_eq!(
            meta,
            Pagination { page: 2, per_page: 10, total: 35, total_pages: 4 }
        );
    }

    #[test]
    fn zero_rows_means_zero_pages() {
        let p = clamp_page_params(None, Some(10), 20, 100);
        let meta = pagination_meta(&p, 0);
        assert_eq!(meta.total, 0);
        assert_eq!(meta.total_pages, 0);
    }

    #[test]
    fn exact_multiple_has_no_partial_page() {
        let p = clamp_page_params(None, Some(10), 20, 100);
        assert_eq!(pagination_meta(&p, 30).total_pages, 3);
        assert_eq!(pagination_meta(&p, 31).total_pages, 4);
    }
}
