//! Lifecycle supervision: start one transport, race it against a stop
//! request, and bound the time graceful shutdown may take.

pub mod context;
pub mod error;
pub mod signal;
pub mod supervisor;

pub use context::{InFlightGuard, LifecycleContext, LifecycleState};
pub use error::LifecycleError;
pub use signal::{shutdown_signal, wait_for_termination, TerminationSignal};
pub use supervisor::{Outcome, RunningServer, Supervisor};
