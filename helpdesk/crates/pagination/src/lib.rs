//! Page request arithmetic and page envelopes shared by helpdesk listings.
//!
//! Listings are addressed by a 1-based page number and a page size. The
//! backend is asked for the inclusive row range
//! `[offset, offset + size - 1]` together with an exact match count, and the
//! envelope derives the page count from that total.
//!
//! # Examples
//! ```
//! use pagination::{Page, PageRequest};
//!
//! let request = PageRequest::new(3, 10).expect("valid request");
//! assert_eq!(request.offset(), 20);
//! assert_eq!(request.last_index(), 29);
//!
//! let page = Page::new(vec!["a", "b"], 22, request);
//! assert_eq!(page.total_pages(), 3);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Page size used when callers do not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Errors raised while validating a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageRequestError {
    /// Page numbers start at 1.
    #[error("page number must be at least 1")]
    ZeroPage,
    /// A page must hold at least one row.
    #[error("page size must be at least 1")]
    ZeroSize,
    /// The requested size exceeds [`MAX_PAGE_SIZE`].
    #[error("page size must be at most {max}")]
    SizeTooLarge {
        /// Maximum accepted size.
        max: u32,
    },
}

/// Validated 1-based page request.
///
/// ## Invariants
/// - `page >= 1`
/// - `1 <= size <= MAX_PAGE_SIZE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PageRequestDto", into = "PageRequestDto")]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Validate and build a page request.
    ///
    /// # Errors
    ///
    /// Returns [`PageRequestError`] when the page is zero or the size is out
    /// of range.
    pub const fn new(page: u32, size: u32) -> Result<Self, PageRequestError> {
        if page == 0 {
            return Err(PageRequestError::ZeroPage);
        }
        if size == 0 {
            return Err(PageRequestError::ZeroSize);
        }
        if size > MAX_PAGE_SIZE {
            return Err(PageRequestError::SizeTooLarge { max: MAX_PAGE_SIZE });
        }
        Ok(Self { page, size })
    }

    /// First page with the given size.
    ///
    /// # Errors
    ///
    /// Returns [`PageRequestError`] when the size is out of range.
    pub const fn first(size: u32) -> Result<Self, PageRequestError> {
        Self::new(1, size)
    }

    /// 1-based page number.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Maximum number of rows on the page.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Zero-based index of the first row on the page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1).saturating_mul(self.size as u64)
    }

    /// Row limit for the page; equal to the page size.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.size
    }

    /// Zero-based index of the last row on the page (inclusive).
    #[must_use]
    pub const fn last_index(&self) -> u64 {
        self.offset().saturating_add(self.size as u64 - 1)
    }

    /// Number of pages needed to show `total` rows at this size.
    #[must_use]
    pub const fn total_pages(&self, total: u64) -> u64 {
        total_pages(total, self.size)
    }

    /// Request for another page with the same size.
    ///
    /// # Errors
    ///
    /// Returns [`PageRequestError::ZeroPage`] when `page` is zero.
    pub const fn with_page(self, page: u32) -> Result<Self, PageRequestError> {
        Self::new(page, self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Number of pages of `size` rows needed to hold `total` rows.
///
/// A zero size yields zero pages rather than dividing by zero.
#[must_use]
pub const fn total_pages(total: u64, size: u32) -> u64 {
    if size == 0 {
        return 0;
    }
    total.div_ceil(size as u64)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct PageRequestDto {
    page: u32,
    size: u32,
}

impl From<PageRequest> for PageRequestDto {
    fn from(value: PageRequest) -> Self {
        Self {
            page: value.page,
            size: value.size,
        }
    }
}

impl TryFrom<PageRequestDto> for PageRequest {
    type Error = PageRequestError;

    fn try_from(value: PageRequestDto) -> Result<Self, Self::Error> {
        Self::new(value.page, value.size)
    }
}

/// One page of rows plus the total number of rows matching the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    items: Vec<T>,
    total_count: u64,
    request: PageRequest,
}

impl<T> Page<T> {
    /// Build a page envelope.
    #[must_use]
    pub const fn new(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_count,
            request,
        }
    }

    /// Empty first page for the given request.
    #[must_use]
    pub const fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    /// Rows on this page.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Consume the envelope and return its rows.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Total rows matching the query, ignoring the page slice.
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Request that produced this page.
    #[must_use]
    pub const fn request(&self) -> PageRequest {
        self.request
    }

    /// 1-based page number.
    #[must_use]
    pub const fn current_page(&self) -> u32 {
        self.request.page()
    }

    /// Number of pages for the total count.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.request.total_pages(self.total_count)
    }

    /// Whether the page holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Map every row while keeping the counts.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            request: self.request,
        }
    }
}
