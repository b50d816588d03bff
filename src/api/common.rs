//! Common API utilities and shared types

use serde::Deserialize;

/// Default page number (1-indexed)
pub fn default_page() -> i64 {
    1
}

/// Default page size
pub fn default_per_page() -> i64 {
    20
}

const MAX_PER_PAGE: i64 = 100;

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl PaginationQuery {
    /// Clamped (limit, offset) for the repository layer.
    pub fn limit_offset(&self) -> (i64, i64) {
        let per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        let page = self.page.max(1);
        (per_page, (page - 1) * per_page)
    }
}
