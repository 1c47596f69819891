//! Errors produced by the lifecycle supervisor.

use std::time::Duration;

use tokio::task::JoinError;

use crate::transport::TransportError;

/// Fatal outcomes of supervising a transport.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The listener could not be acquired; the serve loop never started.
    #[error("{transport} transport failed to bind: {source}")]
    Bind {
        transport: &'static str,
        #[source]
        source: TransportError,
    },

    /// The serve loop ended with an unrecoverable error.
    #[error("{transport} transport failed while serving: {source}")]
    Serve {
        transport: &'static str,
        #[source]
        source: TransportError,
    },

    /// The serve task panicked or was cancelled from outside.
    #[error("{transport} serve task terminated abnormally: {source}")]
    Panicked {
        transport: &'static str,
        #[source]
        source: JoinError,
    },

    /// Draining overran its bound and the serve task was aborted.
    #[error(
        "{transport} shutdown did not complete in time \
         (bound {}ms, {in_flight} in flight)",
        .timeout.as_millis()
    )]
    DrainTimeout {
        transport: &'static str,
        timeout: Duration,
        in_flight: u64,
    },
}

impl LifecycleError {
    /// Whether this error came from drain escalation.
    #[must_use]
    pub fn is_drain_timeout(&self) -> bool {
        matches!(self, Self::DrainTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_timeout_message_names_bound_and_in_flight() {
        let err = LifecycleError::DrainTimeout {
            transport: "http",
            timeout: Duration::from_secs(1),
            in_flight: 3,
        };
        assert!(err.is_drain_timeout());
        assert_eq!(
            err.to_string(),
            "http shutdown did not complete in time (bound 1000ms, 3 in flight)"
        );
    }

    #[test]
    fn bind_error_keeps_transport_source() {
        let err = LifecycleError::Bind {
            transport: "rpc",
            source: TransportError::NotBound { transport: "rpc" },
        };
        assert!(!err.is_drain_timeout());
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("rpc transport failed to bind"));
    }
}
