//! Generic "fetch all pages" loop with bounded retry/backoff.
//!
//! A page that keeps failing after the retry ceiling abandons the rest of the
//! cursor chain and surfaces the partial result explicitly; callers can never
//! mistake a truncated fetch for a complete one.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::FetchError;
use crate::retry::RetryConfig;

/// Position marker for the next page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Opaque bookmark token returned by the previous page.
    Bookmark(String),
    /// One-based page number.
    PageNumber(u32),
}

/// One fetched page: its items plus the cursor of the following page, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Source of pages for one listing request.
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Issues one page request. `None` asks for the first page.
    fn fetch_page<'a>(
        &'a self,
        cursor: Option<&'a Cursor>,
    ) -> Pin<Box<dyn Future<Output = Result<Page<Self::Item>, FetchError>> + Send + 'a>>;
}

/// Result of walking a cursor chain.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome<T> {
    /// Every page was fetched.
    Complete(Vec<T>),
    /// A page was abandoned after the retry ceiling; `items` holds everything
    /// accumulated before the failure.
    Truncated { items: Vec<T>, error: FetchError },
}

impl<T> PageOutcome<T> {
    pub fn items(&self) -> &[T] {
        match self {
            Self::Complete(items) | Self::Truncated { items, .. } => items,
        }
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Complete(items) | Self::Truncated { items, .. } => items,
        }
    }

    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Source of independent batch requests (e.g. id-chunked analytics calls).
pub trait BatchSource: Send + Sync {
    type Item: Send;
    type Batch: Sync;

    fn fetch_batch<'a>(
        &'a self,
        batch: &'a Self::Batch,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Self::Item>, FetchError>> + Send + 'a>>;
}

/// Result of fetching a set of independent batches.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub items: Vec<T>,
    /// Batches dropped after malformed payloads or retry exhaustion.
    pub skipped_batches: usize,
}

/// Walks paginated listings with per-attempt backoff and inter-page pacing.
#[derive(Debug, Clone, Copy)]
pub struct PageFetcher {
    retry: RetryConfig,
    inter_page_delay: Duration,
}

impl PageFetcher {
    pub const fn new(retry: RetryConfig, inter_page_delay: Duration) -> Self {
        Self {
            retry,
            inter_page_delay,
        }
    }

    /// Fetches every page of a single cursor chain.
    pub async fn fetch_all<S: PageSource>(&self, source: &S) -> PageOutcome<S::Item> {
        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;

        loop {
            let page = match self.fetch_one_page(source, cursor.as_ref()).await {
                Ok(page) => page,
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        accumulated = items.len(),
                        "abandoning remaining pages"
                    );
                    return PageOutcome::Truncated { items, error };
                }
            };

            items.extend(page.items);

            match page.next {
                Some(next) => {
                    cursor = Some(next);
                    if !self.inter_page_delay.is_zero() {
                        tokio::time::sleep(self.inter_page_delay).await;
                    }
                }
                None => return PageOutcome::Complete(items),
            }
        }
    }

    /// Fetches a set of independent batches. A batch that fails terminally is
    /// skipped; the loop always continues to the next batch.
    pub async fn fetch_batches<S: BatchSource>(
        &self,
        source: &S,
        batches: &[S::Batch],
    ) -> BatchOutcome<S::Item> {
        let mut items = Vec::new();
        let mut skipped = 0usize;

        for batch in batches {
            let mut result = None;
            for attempt in 0..=self.retry.max_retries {
                match source.fetch_batch(batch).await {
                    Ok(rows) => {
                        result = Some(rows);
                        break;
                    }
                    Err(error) if error.retryable() && attempt < self.retry.max_retries => {
                        let delay = self.retry.delay_for_attempt(attempt);
                        tracing::warn!(attempt, error = %error, "batch attempt failed, retrying");
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "skipping batch");
                        break;
                    }
                }
            }

            match result {
                Some(rows) => {
                    items.extend(rows);
                    if !self.inter_page_delay.is_zero() {
                        tokio::time::sleep(self.inter_page_delay).await;
                    }
                }
                None => skipped += 1,
            }
        }

        BatchOutcome {
            items,
            skipped_batches: skipped,
        }
    }

    async fn fetch_one_page<S: PageSource>(
        &self,
        source: &S,
        cursor: Option<&Cursor>,
    ) -> Result<Page<S::Item>, FetchError> {
        let mut attempt = 0u32;
        loop {
            match source.fetch_page(cursor).await {
                Ok(page) => return Ok(page),
                Err(error) if error.retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %error,
                        "page attempt failed, backing off"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Three pages; page 2 fails with transport errors a configurable number
    /// of times before succeeding.
    struct FlakyPages {
        failures_left: Mutex<u32>,
        attempts: Mutex<u32>,
    }

    impl FlakyPages {
        fn new(failures_on_page_two: u32) -> Self {
            Self {
                failures_left: Mutex::new(failures_on_page_two),
                attempts: Mutex::new(0),
            }
        }

        fn attempts(&self) -> u32 {
            *self.attempts.lock().expect("attempt counter lock")
        }
    }

    impl PageSource for FlakyPages {
        type Item = u32;

        fn fetch_page<'a>(
            &'a self,
            cursor: Option<&'a Cursor>,
        ) -> Pin<Box<dyn Future<Output = Result<Page<u32>, FetchError>> + Send + 'a>> {
            *self.attempts.lock().expect("attempt counter lock") += 1;
            let result = match cursor {
                None => Ok(Page {
                    items: vec![1, 2],
                    next: Some(Cursor::PageNumber(2)),
                }),
                Some(Cursor::PageNumber(2)) => {
                    let mut left = self.failures_left.lock().expect("failure counter lock");
                    if *left > 0 {
                        *left -= 1;
                        Err(FetchError::transport("connection reset"))
                    } else {
                        Ok(Page {
                            items: vec![3, 4],
                            next: Some(Cursor::PageNumber(3)),
                        })
                    }
                }
                Some(_) => Ok(Page::last(vec![5])),
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn concatenates_pages_in_order_after_transient_failures() {
        let source = FlakyPages::new(2);
        let fetcher = PageFetcher::new(RetryConfig::immediate(3), Duration::ZERO);

        let outcome = fetcher.fetch_all(&source).await;
        assert!(outcome.is_complete());
        assert_eq!(outcome.items(), &[1, 2, 3, 4, 5]);
        // 3 pages + 2 wasted attempts on page 2.
        assert_eq!(source.attempts(), 5);
    }

    #[tokio::test]
    async fn returns_partial_items_after_retry_exhaustion() {
        let source = FlakyPages::new(10);
        let fetcher = PageFetcher::new(RetryConfig::immediate(2), Duration::ZERO);

        let outcome = fetcher.fetch_all(&source).await;
        match outcome {
            PageOutcome::Truncated { items, error } => {
                assert_eq!(items, vec![1, 2]);
                assert!(matches!(error, FetchError::Transport { .. }));
            }
            PageOutcome::Complete(_) => panic!("fetch must be truncated"),
        }
        // 1 page + (1 + 2 retries) on page 2.
        assert_eq!(source.attempts(), 4);
    }

    struct MalformedFirstPage;

    impl PageSource for MalformedFirstPage {
        type Item = u32;

        fn fetch_page<'a>(
            &'a self,
            _cursor: Option<&'a Cursor>,
        ) -> Pin<Box<dyn Future<Output = Result<Page<u32>, FetchError>> + Send + 'a>> {
            Box::pin(async { Err(FetchError::malformed("unexpected html")) })
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_not_retried() {
        let fetcher = PageFetcher::new(RetryConfig::immediate(5), Duration::ZERO);
        let outcome = fetcher.fetch_all(&MalformedFirstPage).await;
        match outcome {
            PageOutcome::Truncated { items, error } => {
                assert!(items.is_empty());
                assert!(matches!(error, FetchError::MalformedPayload { .. }));
            }
            PageOutcome::Complete(_) => panic!("fetch must be truncated"),
        }
    }

    struct PartiallyMalformedBatches;

    impl BatchSource for PartiallyMalformedBatches {
        type Item = u32;
        type Batch = u32;

        fn fetch_batch<'a>(
            &'a self,
            batch: &'a u32,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u32>, FetchError>> + Send + 'a>> {
            let batch = *batch;
            Box::pin(async move {
                if batch == 2 {
                    Err(FetchError::malformed("invalid json"))
                } else {
                    Ok(vec![batch * 10])
                }
            })
        }
    }

    #[tokio::test]
    async fn batch_mode_skips_bad_batches_and_continues() {
        let fetcher = PageFetcher::new(RetryConfig::immediate(1), Duration::ZERO);
        let batches = vec![1u32, 2, 3];

        let outcome = fetcher
            .fetch_batches(&PartiallyMalformedBatches, &batches)
            .await;

        assert_eq!(outcome.items, vec![10, 30]);
        assert_eq!(outcome.skipped_batches, 1);
    }
}
