//! Fetch loop of a single collection run.
//!
//! One worker task exists per run. It fetches pages strictly one after the
//! other, so insertion order equals page order. Every suspension point
//! (pause wait, limiter delay, network fetch, retry backoff) is raced against
//! the run's cancellation token.

use crate::error::FetchError;
use crate::normalize::normalize_page;
use crate::retry::{IsRetryable, RetryAttempt, with_retry};
use crate::types::{BusinessListing, Event, Progress, Query, RunState};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::state::Shared;

/// Why a page attempt did not produce listings
#[derive(Debug)]
enum StepError {
    /// The run was stopped or superseded
    Cancelled,
    /// The source failed or returned a malformed page
    Fetch(FetchError),
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::Cancelled => f.write_str("cancelled"),
            StepError::Fetch(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl IsRetryable for StepError {
    fn is_retryable(&self) -> bool {
        match self {
            StepError::Cancelled => false,
            StepError::Fetch(e) => e.is_retryable(),
        }
    }
}

/// A normalized page ready to be appended
struct FetchedPage {
    listings: Vec<BusinessListing>,
    has_more: bool,
    total: Option<u64>,
}

/// What the loop does after a page was recorded
enum Next {
    Continue,
    Finished,
}

pub(crate) struct Worker {
    shared: Arc<Shared>,
    generation: u64,
    query: Query,
    cancel: CancellationToken,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        generation: u64,
        query: Query,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            generation,
            query,
            cancel,
        }
    }

    /// Run the fetch loop until the run finishes, fails or is cancelled
    pub(crate) async fn run(self) {
        tracing::debug!(
            generation = self.generation,
            source = self.shared.source.name(),
            query = %self.query,
            "Collection worker started"
        );

        let mut page = 0u32;
        let mut total = None;
        loop {
            let worker = &self;
            let outcome = with_retry(
                &self.shared.retry,
                &self.cancel,
                move |retry| worker.report_retry(page, retry),
                move || worker.fetch_page(page),
            )
            .await;

            let fetched = match outcome {
                None | Some(Err(StepError::Cancelled)) => break,
                Some(Err(StepError::Fetch(error))) => {
                    self.fail(page, error);
                    break;
                }
                Some(Ok(fetched)) => fetched,
            };

            total = fetched.total.or(total);
            match self.record_page(page, fetched, total) {
                Some(Next::Continue) => page += 1,
                Some(Next::Finished) | None => break,
            }
        }

        tracing::debug!(generation = self.generation, "Collection worker exited");
    }

    /// Wait for the limiter and fetch one page, honoring pause and cancel
    async fn fetch_page(&self, page: u32) -> Result<FetchedPage, StepError> {
        loop {
            self.wait_while_paused().await?;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StepError::Cancelled),
                _ = self.shared.limiter.acquire() => {}
            }
            // A pause that arrived during the limiter wait must not let the
            // request through; the grant is spent and re-acquired on resume.
            if self.shared.published_run_state() != RunState::Paused {
                break;
            }
        }

        let source = &self.shared.source;
        let raw = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StepError::Cancelled),
            result = source.fetch(&self.query, page, &self.shared.credential) => {
                result.map_err(StepError::Fetch)?
            }
        };

        let listings = normalize_page(&raw.records).map_err(StepError::Fetch)?;
        Ok(FetchedPage {
            listings,
            has_more: raw.has_more,
            total: raw.total,
        })
    }

    /// Park until the run is no longer paused
    async fn wait_while_paused(&self) -> Result<(), StepError> {
        let mut run_state = self.shared.subscribe_run_state();
        if *run_state.borrow() != RunState::Paused {
            return Ok(());
        }
        tracing::debug!(generation = self.generation, "Worker parked while paused");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StepError::Cancelled),
            resumed = run_state.wait_for(|state| *state != RunState::Paused) => {
                match resumed {
                    Ok(_) => Ok(()),
                    Err(_) => Err(StepError::Cancelled),
                }
            }
        }
    }

    /// Append a fetched page; returns `None` if the run is no longer current
    fn record_page(&self, page: u32, fetched: FetchedPage, total: Option<u64>) -> Option<Next> {
        let page_size = self.shared.source.page_size();
        self.shared.mutate_run(self.generation, |state| {
            let records = fetched.listings.len();
            state.snapshot.listings.extend(fetched.listings);
            state.snapshot.pages_fetched += 1;
            state.update_progress(total, page_size);

            let collected = state.snapshot.listings.len();
            let pages = state.snapshot.pages_fetched;
            state.log(format!(
                "Fetched page {}: {records} records (total {collected})",
                page + 1
            ));
            state.set_status(format!("Collected {collected} records from {pages} pages"));
            state.emit(Event::PageFetched {
                page,
                records,
                collected,
            });

            if fetched.has_more && pages < state.config.page_limit {
                return Next::Continue;
            }

            if fetched.has_more {
                tracing::debug!(page_limit = state.config.page_limit, "Page limit reached");
            }
            state.snapshot.progress = Progress::Determinate { fraction: 1.0 };
            state.transition(RunState::Stopped);
            let message = format!("Collection complete: {collected} records from {pages} pages");
            state.log(message.clone());
            state.set_status(message);
            state.emit(Event::Completed { collected, pages });
            state.run = None;
            Next::Finished
        })
    }

    fn report_retry(&self, page: u32, retry: RetryAttempt) {
        self.shared.mutate_run(self.generation, |state| {
            let delay_ms = retry.delay.as_millis() as u64;
            state.log(format!(
                "Retrying page {} after error (attempt {}/{}, waiting {delay_ms} ms): {}",
                page + 1,
                retry.attempt,
                retry.max_attempts,
                retry.error
            ));
            state.emit(Event::Retrying {
                page,
                attempt: retry.attempt,
                max_attempts: retry.max_attempts,
                delay_ms,
                error: retry.error,
            });
        });
    }

    fn fail(&self, page: u32, error: FetchError) {
        tracing::error!(
            generation = self.generation,
            page,
            error = %error,
            code = error.error_code(),
            "Collection failed"
        );
        self.shared.mutate_run(self.generation, |state| {
            let message = error.to_string();
            state.snapshot.last_error = Some(message.clone());
            state.log(format!("Collection failed on page {}: {message}", page + 1));
            state.transition(RunState::Failed);
            state.set_status(format!("Failed: {message}"));
            state.emit(Event::Failed { error: message });
            state.run = None;
        });
    }
}
