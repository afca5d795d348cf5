//! # listing-collector
//!
//! Rate-limited collection of business listings from a paginated search API.
//!
//! ## Design Philosophy
//!
//! listing-collector is designed to be:
//! - **Polite to upstream** - Requests never come closer together than the configured delay
//! - **Controllable** - A run can be paused, resumed and stopped at any time
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events or watch snapshots, polling is optional
//!
//! ## Quick Start
//!
//! ```no_run
//! use listing_collector::{CollectionController, Config, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads the bearer token from YELP_API_KEY
//!     let controller = CollectionController::from_env(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = controller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     controller.start(Query::new("Restaurants", "Toronto, ON"))?;
//!     controller.wait_until_finished().await;
//!
//!     std::fs::write("business_data.csv", controller.export_csv()?)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Collection controller (decomposed into focused submodules)
pub mod controller;
/// Error types
pub mod error;
/// Listing export
pub mod export;
/// Raw record normalization
pub mod normalize;
/// Request rate limiting
pub mod rate_limiter;
/// Retry logic with exponential backoff
pub mod retry;
/// Listing sources
pub mod source;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{CollectionConfig, Config, Credential, RetryConfig, SourceConfig};
pub use controller::CollectionController;
pub use error::{Error, ExportError, FetchError, Result};
pub use export::{CsvExporter, Exporter};
pub use source::{HttpListingSource, ListingSource, Page, RawRecord};
pub use types::{
    BusinessListing, CollectionSnapshot, Coordinates, Event, Progress, Query, RunState,
};

/// Drive the current run until it finishes or a termination signal arrives.
///
/// On a signal the run is stopped and its worker joined via `shutdown()`.
/// Returns the state the run ended in.
///
/// On Unix both SIGTERM and SIGINT count; elsewhere only Ctrl+C.
///
/// # Example
///
/// ```no_run
/// use listing_collector::{CollectionController, Config, Query, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let controller = CollectionController::from_env(Config::default())?;
///     controller.start(Query::new("Cafes", "Montreal, QC"))?;
///
///     // Ctrl+C stops the run and keeps what was collected
///     let state = run_with_shutdown(&controller).await;
///     println!("{state}: {} records", controller.snapshot().collected_count);
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(controller: &CollectionController) -> RunState {
    tokio::select! {
        state = controller.wait_until_finished() => state,
        _ = wait_for_signal() => {
            controller.shutdown().await;
            controller.state()
        }
    }
}

/// Resolve on SIGTERM or Ctrl+C. If no signal can be registered this never
/// resolves, so the run is left to finish on its own.
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, stopping collection"),
                result = tokio::signal::ctrl_c() => on_ctrl_c(result).await,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, listening for Ctrl+C only");
            on_ctrl_c(tokio::signal::ctrl_c().await).await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    on_ctrl_c(tokio::signal::ctrl_c().await).await;
}

async fn on_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::info!("Received Ctrl+C, stopping collection"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
