//! Shared controller state and its publication to observers.

use crate::config::{CollectionConfig, Credential, RetryConfig};
use crate::rate_limiter::RateLimiter;
use crate::source::ListingSource;
use crate::types::{CollectionSnapshot, Event, Progress, RunState};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to the worker task of the active run
pub(crate) struct RunHandle {
    /// Generation of the run this worker serves
    pub(crate) generation: u64,
    /// Cancels every suspension point of the worker
    pub(crate) cancel: CancellationToken,
    /// Worker task
    pub(crate) join: JoinHandle<()>,
}

/// Mutable state guarded by the controller mutex
pub(crate) struct ControllerState {
    /// Observable view, published after every mutation
    pub(crate) snapshot: CollectionSnapshot,
    /// Settings applied to the next page fetch
    pub(crate) config: CollectionConfig,
    /// Id of the current run; bumped by every accepted start
    pub(crate) generation: u64,
    /// Worker of the active run, if any
    pub(crate) run: Option<RunHandle>,
    /// Events produced by the current mutation, drained on publish
    pending: Vec<Event>,
}

impl ControllerState {
    pub(crate) fn new(config: CollectionConfig) -> Self {
        Self {
            snapshot: CollectionSnapshot::default(),
            config,
            generation: 0,
            run: None,
            pending: Vec::new(),
        }
    }

    /// Move to `to`, recording a state change event
    pub(crate) fn transition(&mut self, to: RunState) {
        let from = self.snapshot.state;
        debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
        self.snapshot.state = to;
        if to.is_terminal() {
            self.snapshot.finished_at = Some(Utc::now());
        }
        tracing::debug!(%from, %to, generation = self.generation, "Collection state changed");
        self.pending.push(Event::StateChanged { from, to });
    }

    /// Append a line to the activity log and mirror it to tracing
    pub(crate) fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(generation = self.generation, "{message}");
        self.snapshot.log_messages.push(message.clone());
        self.pending.push(Event::Log { message });
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.snapshot.status_message = status.into();
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.pending.push(event);
    }

    /// Whether a worker of `generation` may still mutate the snapshot
    pub(crate) fn accepts(&self, generation: u64) -> bool {
        self.generation == generation && self.snapshot.state.is_active()
    }

    /// Recompute progress from the page counter
    ///
    /// `total` is the match count reported by the source, `page_size` its
    /// page bound.
    pub(crate) fn update_progress(&mut self, total: Option<u64>, page_size: u32) {
        let pages = self.snapshot.pages_fetched;
        self.snapshot.progress = match total {
            Some(total) => {
                let page_size = u64::from(page_size.max(1));
                let estimated = total
                    .div_ceil(page_size)
                    .min(u64::from(self.config.page_limit));
                let fraction = if estimated == 0 {
                    1.0
                } else {
                    (f64::from(pages) / estimated as f64).clamp(0.0, 1.0)
                };
                Progress::Determinate { fraction }
            }
            None => Progress::Indeterminate {
                pages_fetched: pages,
            },
        };
    }
}

/// State shared between the controller and its worker
pub(crate) struct Shared {
    pub(crate) source: Arc<dyn ListingSource>,
    pub(crate) credential: Credential,
    pub(crate) limiter: RateLimiter,
    pub(crate) retry: RetryConfig,
    state: Mutex<ControllerState>,
    event_tx: broadcast::Sender<Event>,
    snapshot_tx: watch::Sender<CollectionSnapshot>,
    run_state_tx: watch::Sender<RunState>,
}

impl Shared {
    pub(crate) fn new(
        source: Arc<dyn ListingSource>,
        credential: Credential,
        collection: CollectionConfig,
        retry: RetryConfig,
        event_capacity: usize,
    ) -> Self {
        let limiter = RateLimiter::with_interval(collection.request_delay());
        let (event_tx, _rx) = broadcast::channel(event_capacity);
        let (snapshot_tx, _rx) = watch::channel(CollectionSnapshot::default());
        let (run_state_tx, _rx) = watch::channel(RunState::Idle);
        Self {
            source,
            credential,
            limiter,
            retry,
            state: Mutex::new(ControllerState::new(collection)),
            event_tx,
            snapshot_tx,
            run_state_tx,
        }
    }

    /// Lock the state, recovering from a poisoned mutex
    pub(crate) fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` under the lock, then publish the snapshot and pending events
    ///
    /// Publication happens before the lock is released so observers never
    /// see a state that a later mutation has already replaced.
    pub(crate) fn mutate<T>(&self, f: impl FnOnce(&mut ControllerState) -> T) -> T {
        let mut state = self.lock();
        let out = f(&mut state);
        self.publish(&mut state);
        out
    }

    /// Like [`mutate`](Self::mutate), but only while run `generation` is
    /// current and active; returns `None` for a stale worker
    pub(crate) fn mutate_run<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut ControllerState) -> T,
    ) -> Option<T> {
        let mut state = self.lock();
        if !state.accepts(generation) {
            tracing::debug!(
                generation,
                current = state.generation,
                state = %state.snapshot.state,
                "Discarding result of stale run"
            );
            return None;
        }
        let out = f(&mut state);
        self.publish(&mut state);
        Some(out)
    }

    fn publish(&self, state: &mut ControllerState) {
        state.snapshot.collected_count = state.snapshot.listings.len();
        self.snapshot_tx.send_replace(state.snapshot.clone());
        let run_state = state.snapshot.state;
        self.run_state_tx.send_if_modified(|current| {
            if *current == run_state {
                false
            } else {
                *current = run_state;
                true
            }
        });
        for event in state.pending.drain(..) {
            // No subscribers is fine
            self.event_tx.send(event).ok();
        }
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub(crate) fn subscribe_snapshots(&self) -> watch::Receiver<CollectionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub(crate) fn subscribe_run_state(&self) -> watch::Receiver<RunState> {
        self.run_state_tx.subscribe()
    }

    /// Latest published run state, readable without the state lock
    pub(crate) fn published_run_state(&self) -> RunState {
        *self.run_state_tx.borrow()
    }
}
