//! Test configuration helpers for pointing the collector at a mock server

use listing_collector::config::{CollectionConfig, RetryConfig, SourceConfig};
use listing_collector::{Config, Credential, HttpListingSource};
use std::time::Duration;
use wiremock::MockServer;

use super::fixtures::{SEARCH_PATH, TEST_TOKEN};

/// Source settings for the search endpoint of `server`
pub fn source_config(server: &MockServer, page_size: u32) -> SourceConfig {
    SourceConfig {
        endpoint: format!("{}{}", server.uri(), SEARCH_PATH),
        page_size,
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// HTTP source for the endpoint of `server`
pub fn http_source(server: &MockServer, page_size: u32) -> HttpListingSource {
    HttpListingSource::new(&source_config(server, page_size)).unwrap()
}

/// Fastest accepted rate, retries disabled
pub fn fast_config(server: &MockServer, page_size: u32, page_limit: u32) -> Config {
    Config {
        collection: CollectionConfig {
            request_delay_secs: 0.1,
            page_limit,
        },
        source: source_config(server, page_size),
        retry: RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    }
}

pub fn credential() -> Credential {
    Credential::new(TEST_TOKEN).unwrap()
}
