//! Shared lifecycle context: state machine, in-flight tracking and the
//! process-wide shutdown token.
//!
//! Uses `ArcSwap` for lock-free state transitions and an atomic counter with
//! RAII guards for in-flight request tracking. One context exists per served
//! transport and is handed to both the serve task and the supervisor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Lifecycle state of the single served transport.
///
/// State machine: Starting -> Serving -> {Stopped | Draining -> Stopped | Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Listener is being acquired.
    Starting,
    /// Listener is bound and the serve loop is running.
    Serving,
    /// Graceful stop requested; in-flight work is finishing.
    Draining,
    /// Serve loop finished and the listener has been released.
    Stopped,
    /// Bind failed, the serve loop failed, or draining overran its bound.
    Failed,
}

impl LifecycleState {
    /// Returns the lowercase name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Serving => "serving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition can leave this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared state passed to the serve task and owned by the supervisor.
///
/// 1. Transports select on `shutdown_requested()` to stop accepting work
/// 2. Request handlers hold an `in_flight_guard()` while they run
/// 3. The supervisor calls `begin_drain()` once, then records the outcome
#[derive(Debug)]
pub struct LifecycleContext {
    shutdown: CancellationToken,
    in_flight: Arc<AtomicU64>,
    state: ArcSwap<LifecycleState>,
}

impl LifecycleContext {
    /// Creates a new context in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            in_flight: Arc::new(AtomicU64::new(0)),
            state: ArcSwap::from_pointee(LifecycleState::Starting),
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        **self.state.load()
    }

    /// Moves to `next` unless the current state is terminal.
    ///
    /// Returns `false` when the transition was refused.
    fn transition(&self, next: LifecycleState) -> bool {
        let previous = self.state.rcu(|current| {
            if current.is_terminal() {
                Arc::clone(current)
            } else {
                Arc::new(next)
            }
        });
        !previous.is_terminal()
    }

    /// Marks the listener as bound and the serve loop as running.
    pub fn set_serving(&self) {
        self.transition(LifecycleState::Serving);
    }

    /// Records a clean terminal outcome.
    pub fn set_stopped(&self) {
        self.transition(LifecycleState::Stopped);
    }

    /// Records a failed terminal outcome.
    pub fn set_failed(&self) {
        self.transition(LifecycleState::Failed);
    }

    /// Requests graceful stop: moves to `Draining` and cancels the token.
    ///
    /// Returns `true` only for the call that actually started draining, so a
    /// repeated stop request is a no-op.
    pub fn begin_drain(&self) -> bool {
        let previous = self.state.rcu(|current| match **current {
            LifecycleState::Starting | LifecycleState::Serving => {
                Arc::new(LifecycleState::Draining)
            }
            _ => Arc::clone(current),
        });
        let started = matches!(
            *previous,
            LifecycleState::Starting | LifecycleState::Serving
        );
        if started {
            self.shutdown.cancel();
        }
        started
    }

    /// Whether graceful stop has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once graceful stop has been requested.
    ///
    /// The returned future is `'static`, so it can be handed to servers that
    /// take an owned shutdown future.
    #[must_use]
    pub fn shutdown_requested(&self) -> WaitForCancellationFutureOwned {
        self.shutdown.clone().cancelled_owned()
    }

    /// Creates an RAII guard that tracks an in-flight request.
    ///
    /// The counter is incremented on creation and decremented when the guard
    /// is dropped, even if the handler panics.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Returns the current number of in-flight requests.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

impl Default for LifecycleContext {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
