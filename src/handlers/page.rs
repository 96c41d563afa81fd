//! Pagination over a counted result set.

use serde::Serialize;

pub const PAGE_SIZE: i64 = 10;

/// One page of `item_count` items. An empty set or an index past the last page
/// falls back to page 1 with nothing to fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub item_count: i64,
    pub page_index: i64,
    pub page_size: i64,
    pub page_count: i64,
    pub offset: i64,
    pub limit: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    pub fn new(item_count: i64, page_index: i64, page_size: i64) -> Self {
        let page_count = item_count / page_size + i64::from(item_count % page_size > 0);
        let (page_index, offset, limit) = if item_count == 0 || page_index > page_count {
            (1, 0, 0)
        } else {
            (page_index, page_size * (page_index - 1), page_size)
        };
        Page {
            item_count,
            page_index,
            page_size,
            page_count,
            offset,
            limit,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }
}

/// `page` query value to a 1-based index. Unparseable or < 1 means 1.
pub fn get_page_index(page: Option<&str>) -> i64 {
    page.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}
