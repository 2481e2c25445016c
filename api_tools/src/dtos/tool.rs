use db::models::{
    tool::{Category, Tool},
    usage::ToolUsage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TOOLS_PER_PAGE: i64 = 12;

#[derive(Debug, Deserialize)]
pub struct ToolListQuery {
    pub category: Option<String>,
    pub page: Option<i64>,
}

/// One page of a listing. Out-of-range page numbers land on the nearest
/// existing page, and an empty listing still has page 1.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Page {
    pub fn resolve(requested: Option<i64>, total: i64, per_page: i64) -> Self {
        let total_pages = ((total + per_page - 1) / per_page).max(1);
        let number = requested.unwrap_or(1).clamp(1, total_pages);
        Self {
            number,
            per_page,
            total,
            total_pages,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub categories: Vec<Category>,
    pub selected_category: Option<String>,
    pub tools: Vec<Tool>,
    pub page: Page,
    pub has_next: bool,
}

#[derive(Debug, Serialize)]
pub struct ToolDetailResponse {
    pub tool: Tool,
    pub recent_usage: Vec<ToolUsage>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub output: Value,
    pub tokens_used: i64,
    pub cost_micros: i64,
    pub usage: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_has_one_page() {
        let page = Page::resolve(None, 0, TOOLS_PER_PAGE);
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.offset(), 0);
        assert!(!page.has_next());
    }

    #[test]
    fn partial_last_page_counts() {
        let page = Page::resolve(Some(2), 25, TOOLS_PER_PAGE);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset(), 12);
        assert!(page.has_next());
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        assert_eq!(Page::resolve(Some(99), 25, TOOLS_PER_PAGE).number, 3);
        assert_eq!(Page::resolve(Some(0), 25, TOOLS_PER_PAGE).number, 1);
        assert_eq!(Page::resolve(Some(-4), 25, TOOLS_PER_PAGE).number, 1);
    }
}
