//! Pagination types
//!
//! Page requests handed to the caller's fetch function, the page results it
//! returns, and the aggregate the engine builds from them.

use crate::config::ClientConfig;
use crate::error::Error;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// One page the engine wants fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page number
    pub index: usize,
    /// Offset of the first element of the page
    pub cursor: usize,
    /// Number of elements requested
    pub page_size: usize,
}

impl PageRequest {
    /// Request for page `index` of size `page_size`
    pub fn nth(index: usize, page_size: usize) -> Self {
        Self {
            index,
            cursor: index * page_size,
            page_size,
        }
    }
}

/// What a page fetch returns
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    /// Elements of the page, in server order
    pub elements: Vec<T>,
    /// Total size of the collection as reported by the server
    pub reported_total: Option<usize>,
}

impl<T> PageResult<T> {
    /// Create a page result
    pub fn new(elements: Vec<T>, reported_total: Option<usize>) -> Self {
        Self {
            elements,
            reported_total,
        }
    }
}

/// Ordered aggregate of one or more pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedCollection<T> {
    /// Elements in ascending cursor order
    pub elements: Vec<T>,
    /// Number of elements in `elements`
    pub fetched_count: usize,
    /// Limit the caller asked for; `None` means everything
    pub requested_limit: Option<usize>,
    /// Fewer elements than requested, or the page cap was hit
    pub truncated: bool,
    /// Page fetches that succeeded
    pub pages_fetched: usize,
}

impl<T> AggregatedCollection<T> {
    pub(crate) fn new(
        elements: Vec<T>,
        requested_limit: Option<usize>,
        pages_fetched: usize,
        capped: bool,
    ) -> Self {
        let fetched_count = elements.len();
        let truncated = capped || requested_limit.is_some_and(|limit| fetched_count < limit);
        Self {
            elements,
            fetched_count,
            requested_limit,
            truncated,
            pages_fetched,
        }
    }

    /// Empty collection, no pages fetched
    pub fn empty(requested_limit: Option<usize>) -> Self {
        Self::new(Vec::new(), requested_limit, 0, false)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// No elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Take the elements
    pub fn into_elements(self) -> Vec<T> {
        self.elements
    }
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Default page size
    pub page_size: usize,
    /// Maximum page fetches in flight after the first page
    pub concurrency: usize,
    /// Bound for each page fetch
    pub page_timeout: Option<Duration>,
    /// Maximum pages per collection
    pub max_pages: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for PaginationConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            page_size: config.page_size,
            concurrency: config.concurrency.max(1),
            page_timeout: Some(config.page_timeout()),
            max_pages: config.max_pages.max(1),
        }
    }
}

impl PaginationConfig {
    /// Set concurrency
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the page timeout
    #[must_use]
    pub fn with_page_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Set the page cap
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}

/// Pages that succeeded before a later page failed
#[derive(Debug)]
pub struct PartialCollection<T> {
    /// Contiguous prefix of successful pages, `truncated` set
    pub partial: AggregatedCollection<T>,
    /// Why the page failed
    pub cause: Error,
    /// Cursor of the failed page
    pub cursor: usize,
    /// Index of the failed page
    pub page_index: usize,
}

/// Failure of a collection fetch
#[derive(Debug)]
pub enum CollectionError<T> {
    /// Nothing usable: bad arguments or the first page failed
    Failed(Error),
    /// A later page failed; earlier pages are still usable
    Partial(PartialCollection<T>),
}

impl<T> CollectionError<T> {
    /// Underlying cause
    pub fn cause(&self) -> &Error {
        match self {
            CollectionError::Failed(e) => e,
            CollectionError::Partial(p) => &p.cause,
        }
    }

    /// Accept a partial result; total failures stay errors
    pub fn into_partial(self) -> Result<AggregatedCollection<T>, Error> {
        match self {
            CollectionError::Failed(e) => Err(e),
            CollectionError::Partial(p) => Ok(p.partial),
        }
    }

    /// Whether the failure was upstream throttling
    pub fn is_rate_limited(&self) -> bool {
        self.cause().is_rate_limited()
    }
}

impl<T> fmt::Display for CollectionError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Failed(e) => write!(f, "{e}"),
            CollectionError::Partial(p) => write!(
                f,
                "Page {} at cursor {} failed after {} elements: {}",
                p.page_index, p.cursor, p.partial.fetched_count, p.cause
            ),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for CollectionError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause())
    }
}

impl<T> From<Error> for CollectionError<T> {
    fn from(e: Error) -> Self {
        CollectionError::Failed(e)
    }
}

impl<T> From<CollectionError<T>> for Error {
    fn from(e: CollectionError<T>) -> Self {
        match e {
            CollectionError::Failed(e) => e,
            CollectionError::Partial(p) => Error::PartialPageFailure {
                cursor: p.cursor,
                page_index: p.page_index,
                fetched: p.partial.fetched_count,
                source: Box::new(p.cause),
            },
        }
    }
}

/// Outcome of a collection fetch
pub type CollectionResult<T> = Result<AggregatedCollection<T>, CollectionError<T>>;
