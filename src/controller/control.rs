//! Run lifecycle control: start, pause, resume, stop.

use crate::error::{Error, Result};
use crate::types::{CollectionSnapshot, Query, RunState};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::CollectionController;
use super::state::{ControllerState, RunHandle};
use super::worker::Worker;

fn invalid_state(operation: &str, current: RunState) -> Error {
    Error::InvalidState {
        operation: operation.to_string(),
        current_state: current.to_string(),
    }
}

impl CollectionController {
    /// Start a new run for `query`
    ///
    /// Resets the snapshot, moves to `Running` and spawns the fetch loop.
    /// Re-entrant from `Idle`, `Stopped` and `Failed`.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the category or location is blank
    /// - `Error::InvalidState` if a run is running or paused
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use listing_collector::{CollectionController, Query, Result};
    /// # fn example(controller: &CollectionController) -> Result<()> {
    /// controller.start(Query::new("Plumbers", "Ottawa, ON"))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn start(&self, query: Query) -> Result<()> {
        let query = query.trimmed();
        if query.category.is_empty() {
            return Err(Error::config("query.category", "category must not be empty"));
        }
        if query.location.is_empty() {
            return Err(Error::config("query.location", "location must not be empty"));
        }

        self.shared.mutate(|state| {
            let current = state.snapshot.state;
            if current.is_active() {
                return Err(invalid_state("start", current));
            }

            state.generation += 1;
            let generation = state.generation;
            state.snapshot = CollectionSnapshot {
                state: current,
                query: Some(query.clone()),
                started_at: Some(Utc::now()),
                ..Default::default()
            };
            state.transition(RunState::Running);
            state.log(format!("Started collection for {query}"));
            state.set_status(format!("Collecting {query}"));

            let cancel = CancellationToken::new();
            let worker = Worker::new(Arc::clone(&self.shared), generation, query, cancel.clone());
            let join = self.runtime.spawn(worker.run());
            state.run = Some(RunHandle {
                generation,
                cancel,
                join,
            });
            Ok(())
        })
    }

    /// Pause the running collection
    ///
    /// A fetch already in flight completes and its page is kept; no further
    /// request is issued until [`resume`](Self::resume). Pausing a paused run
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the run is running or paused
    pub fn pause(&self) -> Result<()> {
        self.shared.mutate(|state| match state.snapshot.state {
            RunState::Paused => Ok(()),
            RunState::Running => {
                state.transition(RunState::Paused);
                state.log("Collection paused");
                let collected = state.snapshot.listings.len();
                state.set_status(format!("Paused with {collected} records"));
                Ok(())
            }
            other => Err(invalid_state("pause", other)),
        })
    }

    /// Resume a paused collection from the next page
    ///
    /// Resuming a running collection is a no-op.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the run is paused or running
    pub fn resume(&self) -> Result<()> {
        self.shared.mutate(|state| match state.snapshot.state {
            RunState::Running => Ok(()),
            RunState::Paused => {
                state.transition(RunState::Running);
                state.log("Collection resumed");
                if let Some(query) = state.snapshot.query.clone() {
                    state.set_status(format!("Collecting {query}"));
                }
                Ok(())
            }
            other => Err(invalid_state("resume", other)),
        })
    }

    /// Stop the active run
    ///
    /// Cancels the in-flight request and freezes the snapshot. A page that
    /// arrives after this call is discarded.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the run is running or paused
    pub fn stop(&self) -> Result<()> {
        // Dropping the handle detaches the cancelled worker
        self.shared.mutate(stop_locked)?;
        Ok(())
    }
}

/// Move an active run to `Stopped`, handing back its worker handle
pub(super) fn stop_locked(state: &mut ControllerState) -> Result<Option<RunHandle>> {
    let current = state.snapshot.state;
    if !current.is_active() {
        return Err(invalid_state("stop", current));
    }

    let run = state.run.take();
    if let Some(run) = &run {
        // Cancel before the lock is released so the worker cannot start
        // another request for this run.
        run.cancel.cancel();
        tracing::debug!(generation = run.generation, "Cancelling collection worker");
    }

    let collected = state.snapshot.listings.len();
    let pages = state.snapshot.pages_fetched;
    state.transition(RunState::Stopped);
    state.log(format!(
        "Collection stopped: {collected} records from {pages} pages"
    ));
    state.set_status(format!("Stopped with {collected} records"));
    Ok(run)
}
