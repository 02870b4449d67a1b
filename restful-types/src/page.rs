//! Paginated responses and page arithmetic.

use serde::{Deserialize, Serialize};

/// One page of records as returned by a paginated endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData<D> {
    /// Records of the requested page.
    pub page_data: Vec<D>,
    /// Size of the whole collection, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
}

impl<D> PageData<D> {
    /// A page without a reported total.
    pub fn new(page_data: Vec<D>) -> Self {
        Self {
            page_data,
            total_count: None,
        }
    }

    /// A page with the collection size.
    pub fn with_total(page_data: Vec<D>, total_count: usize) -> Self {
        Self {
            page_data,
            total_count: Some(total_count),
        }
    }
}

impl<D> Default for PageData<D> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Number of pages needed to hold `total` records.
#[must_use]
pub const fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    }
}

/// Cuts a flat list into pages of `size`; the last page may be short.
pub fn split_pages<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    if size == 0 {
        return Vec::new();
    }
    let mut pages = Vec::with_capacity(page_count(items.len(), size));
    let mut current = Vec::with_capacity(size);

    for item in items {
        current.push(item);
        if current.len() == size {
            pages.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        pages.push(current);
    }
    pages
}
