//! Navigation transition coordinator.
//!
//! Serializes route changes behind a fixed-duration visual transition:
//! - at most one transition is in flight; a request arriving while the guard
//!   is held is dropped, never queued
//! - the route commit fires `delay` after acceptance
//! - the transition ends `delay + duration` after acceptance
//! - teardown cancels both deferred actions and releases the guard
//!
//! The coordinator is an owned value. Consumers observe it through
//! [`TransitionCoordinator::subscribe`] and drive it only through
//! [`TransitionCoordinator::navigate`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

pub mod overlay;

pub use overlay::Overlay;

/// Delay between accepting a navigation and committing the route.
pub const ANIM_DELAY_MS: u64 = 200;
/// Overlay animation length after the route commit.
pub const ANIM_DURATION_MS: u64 = 1200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("overlay animation of {animation:?} outlasts the {total:?} transition")]
    OverlayTooLong { animation: Duration, total: Duration },
}

/// Timing of one transition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTiming {
    pub delay: Duration,
    pub duration: Duration,
}

impl TransitionTiming {
    /// Time from acceptance until the transition ends.
    pub fn total(&self) -> Duration {
        self.delay + self.duration
    }
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(ANIM_DELAY_MS),
            duration: Duration::from_millis(ANIM_DURATION_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Accepted, route not yet committed.
    Pending,
    /// Route committed, overlay still playing.
    Transitioning,
}

/// What consumers observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionSnapshot {
    pub location: String,
    pub phase: Phase,
}

impl TransitionSnapshot {
    pub fn is_transitioning(&self) -> bool {
        self.phase != Phase::Idle
    }
}

/// The underlying router's location-setting primitive.
///
/// Runs under the coordinator's lock and must not call back into it.
pub trait RouteCommitter: Send + Sync + 'static {
    fn commit(&self, path: &str);
}

impl<F> RouteCommitter for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn commit(&self, path: &str) {
        self(path)
    }
}

/// Outcome of a [`TransitionCoordinator::navigate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Accepted,
    /// Target equals the current location; nothing scheduled.
    AlreadyThere,
    /// A transition is already in flight; the request was dropped.
    Busy,
}

struct Cycle {
    commit: JoinHandle<()>,
    end: JoinHandle<()>,
}

struct Inner {
    guard: bool,
    /// Bumped on every accepted navigation and every teardown. Deferred
    /// actions from an older epoch are ignored.
    epoch: u64,
    cycle: Option<Cycle>,
}

struct Shared {
    inner: Mutex<Inner>,
    state: watch::Sender<TransitionSnapshot>,
    committer: Box<dyn RouteCommitter>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit_route(&self, epoch: u64, target: &str) {
        // Held across the commit so a concurrent teardown cannot interleave.
        let inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        self.committer.commit(target);
        self.state.send_modify(|s| {
            s.location = target.to_string();
            s.phase = Phase::Transitioning;
        });
        debug!(location = target, "Route committed");
    }

    fn finish(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return;
        }
        inner.guard = false;
        inner.cycle = None;
        self.state.send_modify(|s| s.phase = Phase::Idle);
        debug!("Transition finished");
    }
}

/// Owns the guard, the deferred actions and the observable state of one
/// application session. Must be used inside a Tokio runtime.
pub struct TransitionCoordinator {
    shared: Arc<Shared>,
    timing: TransitionTiming,
}

impl TransitionCoordinator {
    pub fn new(initial_location: impl Into<String>, committer: impl RouteCommitter) -> Self {
        Self::with_timing(initial_location, committer, TransitionTiming::default())
    }

    pub fn with_timing(
        initial_location: impl Into<String>,
        committer: impl RouteCommitter,
        timing: TransitionTiming,
    ) -> Self {
        let (state, _) = watch::channel(TransitionSnapshot {
            location: initial_location.into(),
            phase: Phase::Idle,
        });
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    guard: false,
                    epoch: 0,
                    cycle: None,
                }),
                state,
                committer: Box::new(committer),
            }),
            timing,
        }
    }

    /// Requests a route change behind a transition.
    ///
    /// Same-location requests and requests made while a transition is in
    /// flight are silent no-ops.
    pub fn navigate(&self, target: &str) -> Navigation {
        if self.shared.state.borrow().location == target {
            return Navigation::AlreadyThere;
        }

        let mut inner = self.shared.lock();
        if inner.guard {
            debug!(path = target, "Navigation dropped, transition in flight");
            return Navigation::Busy;
        }
        inner.guard = true;
        inner.epoch += 1;
        let epoch = inner.epoch;
        self.shared.state.send_modify(|s| s.phase = Phase::Pending);

        let accepted_at = Instant::now();
        let commit = {
            let shared = Arc::clone(&self.shared);
            let target = target.to_string();
            let at = accepted_at + self.timing.delay;
            tokio::spawn(async move {
                sleep_until(at).await;
                shared.commit_route(epoch, &target);
            })
        };
        let end = {
            let shared = Arc::clone(&self.shared);
            let at = accepted_at + self.timing.total();
            tokio::spawn(async move {
                sleep_until(at).await;
                shared.finish(epoch);
            })
        };
        inner.cycle = Some(Cycle { commit, end });

        debug!(path = target, "Navigation accepted");
        Navigation::Accepted
    }

    pub fn is_transitioning(&self) -> bool {
        self.shared.state.borrow().is_transitioning()
    }

    pub fn current_location(&self) -> String {
        self.shared.state.borrow().location.clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.borrow().phase
    }

    pub fn snapshot(&self) -> TransitionSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn timing(&self) -> TransitionTiming {
        self.timing
    }

    /// Read-only observation for animation consumers.
    pub fn subscribe(&self) -> watch::Receiver<TransitionSnapshot> {
        self.shared.state.subscribe()
    }

    /// Cancels any pending deferred actions and releases the guard.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        inner.epoch += 1;
        if let Some(cycle) = inner.cycle.take() {
            cycle.commit.abort();
            cycle.end.abort();
            debug!("Transition cancelled on teardown");
        }
        inner.guard = false;
        self.shared.state.send_if_modified(|s| {
            let was_active = s.is_transitioning();
            s.phase = Phase::Idle;
            was_active
        });
    }
}

impl Drop for TransitionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
