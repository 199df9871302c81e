//! Cursor-driven pagination
//!
//! Drives any "fetch one page, get the next cursor" listing to completion.
//! The driver is sequential and adds no retry or rate limiting of its own;
//! callers wrap their page fetch with the retry executor.
//!
//! Includes safety mechanisms:
//! - Maximum page count to stop listings whose cursor never terminates
//! - Empty-string cursors treated as terminal

use std::future::Future;
use tracing::debug;

use crate::config::MAX_PAGES;
use crate::error::CollectError;
use crate::metrics;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page, in provider order
    pub items: Vec<T>,
    /// Cursor for the next page; `None` or empty on the last page
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Create a page.
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// Final page of a listing.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Pagination driver with an optional page cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    max_pages: Option<usize>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(Some(MAX_PAGES))
    }
}

impl Paginator {
    /// Create a driver that fails after `max_pages` pages if the cursor has
    /// not terminated. `None` disables the cap.
    pub fn new(max_pages: Option<usize>) -> Self {
        Self { max_pages }
    }

    /// Driver without a page cap.
    ///
    /// A provider that keeps returning cursors loops forever; only use this
    /// when the listing is known to terminate.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Configured page cap.
    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Fetch pages until the returned cursor is `None` or empty.
    ///
    /// `fetch_page` receives `None` for the first page and the previous
    /// cursor afterwards. Returns the number of pages fetched.
    ///
    /// # Errors
    /// - The first error returned by `fetch_page`, unchanged
    /// - [`CollectError::PageLimitExceeded`] if the cap is reached with a
    ///   cursor still pending
    pub async fn retrieve_all<F, Fut>(&self, fetch_page: F) -> Result<usize, CollectError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Option<String>, CollectError>>,
    {
        self.drive(fetch_page, |cursor| cursor).await
    }

    /// Fetch every page of a listing and return all items in page order.
    ///
    /// # Errors
    /// Same as [`Paginator::retrieve_all`].
    pub async fn list_all<T, F, Fut>(&self, fetch_page: F) -> Result<Vec<T>, CollectError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, CollectError>>,
    {
        let mut items = Vec::new();
        self.drive(fetch_page, |page| {
            items.extend(page.items);
            page.next_cursor
        })
        .await?;
        Ok(items)
    }

    async fn drive<P, F, Fut>(
        &self,
        mut fetch_page: F,
        mut on_page: impl FnMut(P) -> Option<String>,
    ) -> Result<usize, CollectError>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<P, CollectError>>,
    {
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if let Some(max_pages) = self.max_pages {
                if pages >= max_pages {
                    return Err(CollectError::PageLimitExceeded { max_pages });
                }
            }

            let page = fetch_page(cursor.take()).await?;
            pages += 1;
            metrics::record_page();

            match on_page(page) {
                Some(next) if !next.is_empty() => {
                    debug!(page = pages, "Fetched page, continuing");
                    cursor = Some(next);
                }
                _ => {
                    debug!(pages = pages, "Pagination complete");
                    return Ok(pages);
                }
            }
        }
    }
}
