//! Shared test helpers for driving a CollectionController against a scripted source.

use crate::config::{CollectionConfig, Config, Credential, RetryConfig};
use crate::controller::CollectionController;
use crate::error::FetchError;
use crate::source::{ListingSource, Page, RawCategory, RawLocation, RawRecord};
use crate::types::{Query, RunState};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type Script = Box<dyn Fn(u32, usize) -> Result<Page, FetchError> + Send + Sync>;

/// Listing source whose responses are computed from `(page, call_index)`
pub(crate) struct ScriptedSource {
    script: Script,
    latency: Duration,
    calls: Mutex<Vec<(u32, Instant)>>,
    /// Number of fetches that ran to completion (not cancelled mid-flight)
    completed: Mutex<usize>,
}

impl ScriptedSource {
    pub(crate) fn new(
        script: impl Fn(u32, usize) -> Result<Page, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(0),
        }
    }

    /// Serve the given pages in order; requests past the end get an empty last page
    pub(crate) fn pages(pages: Vec<Page>) -> Self {
        Self::new(move |page, _| Ok(pages.get(page as usize).cloned().unwrap_or_default()))
    }

    /// Every page holds `per_page` records and reports more
    pub(crate) fn endless(per_page: usize) -> Self {
        Self::new(move |page, _| {
            let records = (0..per_page)
                .map(|i| record(&format!("Business {page}-{i}"), "Toronto"))
                .collect();
            Ok(Page {
                records,
                has_more: true,
                total: None,
            })
        })
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Pages requested so far, in call order
    pub(crate) fn requested_pages(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(page, _)| *page).collect()
    }

    /// Start times of every fetch call
    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn completed_count(&self) -> usize {
        *self.completed.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ListingSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn page_size(&self) -> u32 {
        50
    }

    async fn fetch(
        &self,
        _query: &Query,
        page: u32,
        credential: &Credential,
    ) -> Result<Page, FetchError> {
        assert_eq!(credential.token(), "test-token");
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((page, Instant::now()));
            calls.len() - 1
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        *self.completed.lock().unwrap() += 1;
        (self.script)(page, call)
    }
}

/// Raw record with the required fields set
pub(crate) fn record(name: &str, city: &str) -> RawRecord {
    RawRecord {
        name: Some(name.to_string()),
        categories: vec![RawCategory {
            title: Some("Restaurants".to_string()),
        }],
        location: Some(RawLocation {
            address1: Some("1 Main St".to_string()),
            city: Some(city.to_string()),
            state: Some("ON".to_string()),
            zip_code: Some("M5V 1A1".to_string()),
        }),
        ..Default::default()
    }
}

pub(crate) fn page(names: &[&str], has_more: bool) -> Page {
    Page {
        records: names.iter().map(|n| record(n, "Toronto")).collect(),
        has_more,
        total: None,
    }
}

pub(crate) fn query() -> Query {
    Query::new("Restaurants", "Toronto, ON")
}

/// Fastest accepted request rate, no retries
pub(crate) fn test_config(page_limit: u32) -> Config {
    Config {
        collection: CollectionConfig {
            request_delay_secs: 0.1,
            page_limit,
        },
        retry: RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

pub(crate) fn create_test_controller(
    source: Arc<ScriptedSource>,
    config: Config,
) -> CollectionController {
    let credential = Credential::new("test-token").unwrap();
    CollectionController::new(source, credential, config).unwrap()
}

/// Await a terminal state, failing the test after `limit`
pub(crate) async fn finish_within(controller: &CollectionController, limit: Duration) -> RunState {
    tokio::time::timeout(limit, controller.wait_until_finished())
        .await
        .expect("run did not finish in time")
}

/// Poll until `predicate` holds for the controller snapshot
pub(crate) async fn wait_until(
    controller: &CollectionController,
    limit: Duration,
    predicate: impl Fn(&crate::types::CollectionSnapshot) -> bool,
) {
    let mut rx = controller.watch();
    tokio::time::timeout(limit, rx.wait_for(|snapshot| predicate(snapshot)))
        .await
        .expect("condition not reached in time")
        .expect("snapshot channel closed");
}
