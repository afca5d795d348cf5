//! Custom test assertions for integration tests

use listing_collector::{CollectionController, CollectionSnapshot, RunState};
use std::time::Duration;

/// Wait for the current run to reach a terminal state, panicking after `timeout`
pub async fn wait_for_finish(controller: &CollectionController, timeout: Duration) -> RunState {
    match tokio::time::timeout(timeout, controller.wait_until_finished()).await {
        Ok(state) => state,
        Err(_) => panic!(
            "run did not finish within {timeout:?}; log: {:?}",
            controller.snapshot().log_messages
        ),
    }
}

/// Number of activity log lines starting with `prefix`
pub fn count_log_lines(snapshot: &CollectionSnapshot, prefix: &str) -> usize {
    snapshot
        .log_messages
        .iter()
        .filter(|line| line.starts_with(prefix))
        .count()
}

/// Assert the snapshot invariant that the counter matches the listings
pub fn assert_consistent(snapshot: &CollectionSnapshot) {
    assert_eq!(
        snapshot.collected_count,
        snapshot.listings.len(),
        "collected_count out of sync with listings"
    );
}
