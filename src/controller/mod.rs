//! Rate-limited collection controller split into focused submodules.
//!
//! The `CollectionController` struct and its methods are organized by domain:
//! - [`control`] - Run lifecycle control (start/pause/resume/stop)
//! - [`config_ops`] - Collection settings updates between runs
//! - [`lifecycle`] - Construction, awaiting completion and shutdown
//! - [`state`] - Shared state and snapshot/event publication
//! - [`worker`] - The per-run fetch loop

mod config_ops;
mod control;
mod lifecycle;
mod state;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::export::{CsvExporter, Exporter};
use crate::types::{CollectionSnapshot, Event, RunState};
use state::Shared;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Collection controller for one listing source
///
/// Control calls are synchronous and never block on the network; the fetch
/// loop runs in a Tokio task spawned by [`start`](Self::start). Dropping the
/// controller cancels the active run.
///
/// # Examples
///
/// ```no_run
/// use listing_collector::{CollectionController, Config, Credential, Query};
/// use listing_collector::source::HttpListingSource;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let source = Arc::new(HttpListingSource::new(&config.source)?);
///     let credential = Credential::from_env("YELP_API_KEY")?;
///     let controller = CollectionController::new(source, credential, config)?;
///
///     controller.start(Query::new("Restaurants", "Toronto, ON"))?;
///     let state = controller.wait_until_finished().await;
///     println!("{state}: {} records", controller.snapshot().collected_count);
///
///     let csv = controller.export_csv()?;
///     std::fs::write("business_data.csv", csv)?;
///     Ok(())
/// }
/// ```
pub struct CollectionController {
    shared: Arc<Shared>,
    runtime: tokio::runtime::Handle,
}

impl CollectionController {
    /// Current run state
    pub fn state(&self) -> RunState {
        self.shared.lock().snapshot.state
    }

    /// Consistent copy of the accumulated state
    pub fn snapshot(&self) -> CollectionSnapshot {
        self.shared.lock().snapshot.clone()
    }

    /// Subscribe to controller events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. A subscriber that falls behind by more than the
    /// configured `event_capacity` receives a `RecvError::Lagged` error.
    ///
    /// ```no_run
    /// # use listing_collector::CollectionController;
    /// # fn example(controller: &CollectionController) {
    /// let mut events = controller.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "collection event");
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.subscribe_events()
    }

    /// Receiver of the latest snapshot, updated after every mutation
    pub fn watch(&self) -> watch::Receiver<CollectionSnapshot> {
        self.shared.subscribe_snapshots()
    }

    /// Export the collected listings as CSV bytes
    ///
    /// Allowed in any state; an empty result set yields the header row only.
    pub fn export_csv(&self) -> Result<Vec<u8>> {
        self.export_with(&CsvExporter)
    }

    /// Export the collected listings with a custom exporter
    pub fn export_with(&self, exporter: &dyn Exporter) -> Result<Vec<u8>> {
        let state = self.shared.lock();
        let mut out = Vec::new();
        exporter.export(&state.snapshot.listings, &mut out)?;
        tracing::info!(
            records = state.snapshot.listings.len(),
            bytes = out.len(),
            content_type = exporter.content_type(),
            "Exported collected listings"
        );
        Ok(out)
    }

    /// Append a line to the activity log
    ///
    /// Lets the presentation layer record its own actions (e.g., a completed
    /// save) next to the controller's lines.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        self.shared.mutate(|state| state.log(message));
    }
}
