//! Bounded cursor walking over a paginated history API.
//!
//! [`HistoryPager`] is a lazy, one-shot producer of pages. It stops when the
//! upstream cursor runs out, when the record cap is reached, or when the page
//! budget `ceil(max_records / page_size)` is spent, whichever comes first, so
//! it terminates and bounds memory no matter what the upstream claims.
//! The fetch itself is injected as a closure, which keeps the termination
//! logic testable without a network.

use std::future::Future;

use crate::{Cursor, FetchWindow, HistoryPage, RawMessage, SourceError};

/// Largest page the history API serves.
pub const HISTORY_PAGE_SIZE: usize = 100;

/// Parameters of one page fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    /// Never more than [`HISTORY_PAGE_SIZE`] nor than the records still
    /// allowed under the cap.
    pub limit: usize,
}

pub struct HistoryPager<F> {
    fetch: F,
    cursor: Option<Cursor>,
    max_records: usize,
    max_pages: usize,
    records: usize,
    pages: usize,
    done: bool,
}

impl<F, Fut> HistoryPager<F>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<HistoryPage, SourceError>>,
{
    pub fn new(window: &FetchWindow, fetch: F) -> Self {
        let max_pages = window.max_pages(HISTORY_PAGE_SIZE);
        Self {
            fetch,
            cursor: window.cursor().cloned(),
            max_records: window.max_records(),
            max_pages,
            records: 0,
            pages: 0,
            done: max_pages == 0,
        }
    }

    /// Fetches the next page.
    ///
    /// Returns `None` once exhausted. An error also exhausts the pager: it is
    /// returned once and never retried.
    pub async fn next_page(&mut self) -> Option<Result<Vec<RawMessage>, SourceError>> {
        if self.done {
            return None;
        }

        let remaining = self.max_records - self.records;
        let request = PageRequest {
            cursor: self.cursor.take(),
            limit: remaining.min(HISTORY_PAGE_SIZE),
        };
        self.pages += 1;

        let page = match (self.fetch)(request).await {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let mut messages = page.messages;
        messages.truncate(remaining);
        self.records += messages.len();
        self.cursor = page.next_cursor;

        if self.cursor.is_none() || self.records >= self.max_records || self.pages >= self.max_pages
        {
            self.done = true;
        }
        Some(Ok(messages))
    }

    /// Drains the pager into one vector, stopping at the first error.
    pub async fn collect(mut self) -> Result<Vec<RawMessage>, SourceError> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await {
            all.extend(page?);
        }
        Ok(all)
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn records_fetched(&self) -> usize {
        self.records
    }

    pub fn is_exhausted(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn page(size: usize, next: Option<&str>) -> HistoryPage {
        HistoryPage {
            messages: (0..size)
                .map(|i| RawMessage {
                    ts: format!("{i}.0"),
                    ..Default::default()
                })
                .collect(),
            next_cursor: next.and_then(Cursor::new),
        }
    }

    /// An upstream that always claims another full page is available.
    fn endless(calls: Arc<AtomicUsize>) -> impl FnMut(PageRequest) -> std::future::Ready<Result<HistoryPage, SourceError>> {
        move |req: PageRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(page(req.limit, Some("more"))))
        }
    }

    #[tokio::test]
    async fn test_stops_at_record_cap_despite_more_pages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let window = FetchWindow::new(Duration::days(7), 250);
        let messages = HistoryPager::new(&window, endless(calls.clone()))
            .collect()
            .await
            .expect("pages");

        assert_eq!(messages.len(), 250);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_page_budget_bounds_short_pages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let window = FetchWindow::new(Duration::days(7), 200);
        let calls_in = calls.clone();
        let pager = HistoryPager::new(&window, move |_req: PageRequest| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(page(10, Some("more"))))
        });
        let messages = pager.collect().await.expect("pages");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(messages.len(), 20);
    }

    #[tokio::test]
    async fn test_stops_when_cursor_absent() {
        let requests = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = requests.clone();
        let window = FetchWindow::new(Duration::days(7), 1000);
        let mut pager = HistoryPager::new(&window, move |req: PageRequest| {
            let first = req.cursor.is_none();
            seen.lock().unwrap().push(req);
            std::future::ready(Ok(if first {
                page(100, Some("c2"))
            } else {
                page(40, None)
            }))
        });

        assert_eq!(pager.next_page().await.map(|p| p.map(|m| m.len())), Some(Ok(100)));
        assert_eq!(pager.next_page().await.map(|p| p.map(|m| m.len())), Some(Ok(40)));
        assert!(pager.next_page().await.is_none());
        assert_eq!(pager.pages_fetched(), 2);
        assert_eq!(pager.records_fetched(), 140);

        let requests = requests.lock().unwrap();
        assert_eq!(requests[1].cursor.as_ref().map(Cursor::as_str), Some("c2"));
        assert_eq!(requests[0].limit, HISTORY_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_zero_cap_fetches_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let window = FetchWindow::new(Duration::days(7), 0);
        let mut pager = HistoryPager::new(&window, endless(calls.clone()));
        assert!(pager.next_page().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_exhausts_the_pager() {
        let window = FetchWindow::new(Duration::days(7), 500);
        let mut pager = HistoryPager::new(&window, |_req: PageRequest| {
            std::future::ready(Err(SourceError::Api("not_in_channel".to_string())))
        });
        assert!(matches!(pager.next_page().await, Some(Err(SourceError::Api(_)))));
        assert!(pager.next_page().await.is_none());
        assert!(pager.is_exhausted());
    }

    #[tokio::test]
    async fn test_starts_from_window_cursor() {
        let window = FetchWindow::new(Duration::days(7), 10).with_cursor(Cursor::new("resume").unwrap());
        let mut pager = HistoryPager::new(&window, |req: PageRequest| {
            assert_eq!(req.cursor.as_ref().map(Cursor::as_str), Some("resume"));
            assert_eq!(req.limit, 10);
            std::future::ready(Ok(page(10, Some("next"))))
        });
        assert_eq!(pager.next_page().await.map(|p| p.map(|m| m.len())), Some(Ok(10)));
        assert!(pager.next_page().await.is_none());
    }
}
