//! Collection settings updates.

use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::types::RunState;

use super::CollectionController;

impl CollectionController {
    /// Current collection settings
    pub fn collection_config(&self) -> CollectionConfig {
        self.shared.lock().config.clone()
    }

    /// Replace the collection settings
    ///
    /// Rejected while a run is `Running`. While `Paused` the new delay and
    /// page limit apply from the next page on; otherwise they apply to the
    /// next run.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the settings are out of range
    /// - `Error::InvalidState` while running
    pub fn set_collection_config(&self, config: CollectionConfig) -> Result<()> {
        config.validate()?;
        self.shared.mutate(|state| {
            let current = state.snapshot.state;
            if current == RunState::Running {
                return Err(Error::InvalidState {
                    operation: "update collection settings".to_string(),
                    current_state: current.to_string(),
                });
            }

            self.shared.limiter.set_interval(config.request_delay());
            tracing::info!(
                request_delay_secs = config.request_delay_secs,
                page_limit = config.page_limit,
                "Collection settings updated"
            );
            state.config = config;
            Ok(())
        })
    }
}
