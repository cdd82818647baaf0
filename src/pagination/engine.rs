//! Pagination engine
//!
//! Turns a caller-supplied page fetch into an ordered, bounded aggregate.
//! The first page is fetched alone to learn the reported total; the rest are
//! fetched with bounded concurrency and merged in cursor order.

use super::types::{
    AggregatedCollection, CollectionError, CollectionResult, PageRequest, PageResult,
    PaginationConfig, PartialCollection,
};
use crate::error::{Error, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives page fetches for one collection at a time
#[derive(Debug, Clone, Default)]
pub struct PaginationEngine {
    config: PaginationConfig,
}

impl PaginationEngine {
    /// Create an engine
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// Get the engine config
    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Fetch up to `limit` elements
    ///
    /// A failure of the first page is returned as `CollectionError::Failed`.
    /// A failure of any later page is returned as `CollectionError::Partial`
    /// with the contiguous prefix of pages that succeeded.
    pub async fn fetch_collection<T, F, Fut>(
        &self,
        page_fetch: F,
        page_size: usize,
        limit: usize,
    ) -> CollectionResult<T>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<PageResult<T>>>,
    {
        self.collect(page_fetch, page_size, Some(limit)).await
    }

    /// Fetch the whole collection, up to the page cap
    pub async fn fetch_all<T, F, Fut>(&self, page_fetch: F, page_size: usize) -> CollectionResult<T>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<PageResult<T>>>,
    {
        self.collect(page_fetch, page_size, None).await
    }

    async fn collect<T, F, Fut>(
        &self,
        page_fetch: F,
        page_size: usize,
        limit: Option<usize>,
    ) -> CollectionResult<T>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<PageResult<T>>>,
    {
        if page_size == 0 {
            return Err(CollectionError::Failed(Error::InvalidPageSize { page_size }));
        }
        if limit == Some(0) {
            return Ok(AggregatedCollection::empty(limit));
        }

        let timeout = self.config.page_timeout;
        let max_pages = self.config.max_pages.max(1);

        let (_, first) = fetch_page(&page_fetch, PageRequest::nth(0, page_size), timeout).await;
        let first = first.map_err(CollectionError::Failed)?;

        // Snapshot; later pages never revise it
        let reported_total = first.reported_total;
        if reported_total == Some(0) {
            debug!("collection reported empty");
            return Ok(AggregatedCollection::new(Vec::new(), limit, 1, false));
        }

        let target = match (limit, reported_total) {
            (Some(limit), Some(total)) => Some(limit.min(total)),
            (Some(limit), None) => Some(limit),
            (None, total) => total,
        };

        let first_short = first.elements.len() < page_size;
        let mut elements = first.elements;
        let mut pages_fetched = 1;

        if let Some(target) = target {
            if elements.len() >= target {
                elements.truncate(target);
                return Ok(AggregatedCollection::new(elements, limit, pages_fetched, false));
            }
        }
        if first_short {
            return Ok(AggregatedCollection::new(elements, limit, pages_fetched, false));
        }

        let (last_page, capped) = match target {
            Some(target) => {
                let needed = target.div_ceil(page_size);
                (needed.min(max_pages), needed > max_pages)
            }
            None => (max_pages, false),
        };

        debug!(
            page_size,
            ?limit,
            ?reported_total,
            pages = last_page,
            concurrency = self.config.concurrency,
            "fetching remaining pages"
        );

        let page_fetch = &page_fetch;
        let mut pages = stream::iter((1..last_page).map(|index| PageRequest::nth(index, page_size)))
            .map(move |request| fetch_page(page_fetch, request, timeout))
            .buffered(self.config.concurrency.max(1));

        let mut reached_end = false;
        while let Some((request, result)) = pages.next().await {
            match result {
                Ok(page) => {
                    pages_fetched += 1;
                    let short = page.elements.len() < page_size;
                    elements.extend(page.elements);

                    if let Some(target) = target {
                        if elements.len() >= target {
                            elements.truncate(target);
                            reached_end = true;
                            break;
                        }
                    }
                    if short {
                        debug!(cursor = request.cursor, "short page, end of collection");
                        reached_end = true;
                        break;
                    }
                }
                Err(cause) => {
                    // Stop outstanding fetches before building the partial result
                    drop(pages);
                    warn!(
                        cursor = request.cursor,
                        page_index = request.index,
                        fetched = elements.len(),
                        error = %cause,
                        "page fetch failed, returning partial collection"
                    );
                    let mut partial = AggregatedCollection::new(elements, limit, pages_fetched, false);
                    partial.truncated = true;
                    return Err(CollectionError::Partial(PartialCollection {
                        partial,
                        cause,
                        cursor: request.cursor,
                        page_index: request.index,
                    }));
                }
            }
        }

        // Without a known end the cap is the only stop left
        let capped = capped || (target.is_none() && !reached_end);
        if capped {
            warn!(max_pages, fetched = elements.len(), "page cap reached");
        }

        let collection = AggregatedCollection::new(elements, limit, pages_fetched, capped);
        info!(
            fetched = collection.fetched_count,
            pages = collection.pages_fetched,
            truncated = collection.truncated,
            "collection fetched"
        );
        Ok(collection)
    }
}

async fn fetch_page<T, F, Fut>(
    page_fetch: &F,
    request: PageRequest,
    timeout: Option<Duration>,
) -> (PageRequest, Result<PageResult<T>>)
where
    F: Fn(PageRequest) -> Fut,
    Fut: Future<Output = Result<PageResult<T>>>,
{
    debug!(cursor = request.cursor, page_index = request.index, "fetching page");
    let result = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, page_fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        },
        None => page_fetch(request).await,
    };
    (request, result)
}
