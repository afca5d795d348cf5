//! Construction, completion and shutdown.

use crate::config::{Config, Credential};
use crate::error::{Error, Result};
use crate::source::{HttpListingSource, ListingSource};
use crate::types::RunState;
use std::sync::Arc;

use super::CollectionController;
use super::control::stop_locked;
use super::state::Shared;

impl CollectionController {
    /// Create a controller for `source`
    ///
    /// Must be called from within a Tokio runtime; the runtime handle is
    /// captured here and used to spawn the worker of every run.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the configuration is invalid
    /// - `Error::Runtime` if no Tokio runtime is available
    pub fn new(
        source: Arc<dyn ListingSource>,
        credential: Credential,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Runtime(format!("collection controller needs a Tokio runtime: {e}")))?;

        tracing::info!(
            source = source.name(),
            page_size = source.page_size(),
            request_delay_secs = config.collection.request_delay_secs,
            page_limit = config.collection.page_limit,
            max_retries = config.retry.max_attempts,
            "Collection controller initialized"
        );

        let shared = Shared::new(
            source,
            credential,
            config.collection,
            config.retry,
            config.event_capacity,
        );
        Ok(Self {
            shared: Arc::new(shared),
            runtime,
        })
    }

    /// Create a controller for the reference HTTP source
    ///
    /// The credential is read from the environment variable named by
    /// `config.source.credential_env`, before any network activity.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the credential variable is unset or blank, or the
    /// source settings are invalid; `Error::Runtime` outside a Tokio runtime
    pub fn from_env(config: Config) -> Result<Self> {
        let credential = Credential::from_env(&config.source.credential_env)?;
        let source = HttpListingSource::new(&config.source)?;
        Self::new(Arc::new(source), credential, config)
    }

    /// Wait until the current run reaches a terminal state
    ///
    /// Returns immediately with the current state if no run is active.
    pub async fn wait_until_finished(&self) -> RunState {
        let mut run_state = self.shared.subscribe_run_state();
        match run_state.wait_for(|state| !state.is_active()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Stop the active run, if any, and wait for its worker to exit
    pub async fn shutdown(&self) {
        let run = self.shared.mutate(|state| {
            if state.snapshot.state.is_active() {
                stop_locked(state).ok().flatten()
            } else {
                state.run.take()
            }
        });

        if let Some(run) = run {
            run.cancel.cancel();
            if let Err(e) = run.join.await {
                tracing::warn!(generation = run.generation, error = %e, "Collection worker did not exit cleanly");
            }
        }
        tracing::info!("Collection controller shut down");
    }
}

impl Drop for CollectionController {
    fn drop(&mut self) {
        if let Some(run) = self.shared.lock().run.take() {
            tracing::debug!(generation = run.generation, "Controller dropped, cancelling run");
            run.cancel.cancel();
        }
    }
}
