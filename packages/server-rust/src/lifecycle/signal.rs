//! Termination signal watch.

use std::fmt;

use tracing::{info, warn};

/// Which external signal requested shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Resolves when the first SIGINT or SIGTERM arrives.
///
/// A handler that cannot be installed is logged and never fires; the other
/// one keeps working.
pub async fn wait_for_termination() -> TerminationSignal {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => TerminationSignal::Interrupt,
            Err(err) => {
                warn!(error = %err, "failed to install SIGINT handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                TerminationSignal::Terminate
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<TerminationSignal>();

    tokio::select! {
        signal = interrupt => signal,
        signal = terminate => signal,
    }
}

/// Signal watch handed to [`Supervisor::run`](super::Supervisor::run).
pub async fn shutdown_signal() {
    let signal = wait_for_termination().await;
    info!(%signal, "termination signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpConfig, SupervisorConfig};
    use crate::lifecycle::{LifecycleState, Outcome, Supervisor};
    use crate::transport::{BoundEndpoint, HttpTransport};
    use greeter_core::HelloCommand;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn signal_names() {
        assert_eq!(TerminationSignal::Interrupt.to_string(), "SIGINT");
        assert_eq!(TerminationSignal::Terminate.to_string(), "SIGTERM");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_drains_supervised_http_transport() {
        use tokio::signal::unix::{signal, SignalKind};

        // Registered up front so a SIGTERM can never take down the test process.
        let _keep_alive = signal(SignalKind::terminate()).expect("install SIGTERM handler");

        let config = HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..HttpConfig::default()
        };
        let running = Supervisor::new(
            HttpTransport::new(config, Arc::new(HelloCommand)),
            SupervisorConfig::default(),
        )
        .start()
        .await
        .expect("start http");
        let ctx = running.context();
        let BoundEndpoint::Tcp(addr) = running.endpoint().clone() else {
            panic!("http binds TCP");
        };
        assert_eq!(ctx.state(), LifecycleState::Serving);

        let mut supervised = tokio::spawn(running.wait_for(shutdown_signal()));
        let pid = std::process::id().to_string();

        // Re-send until the watch has been polled and observed a delivery.
        let mut outcome = None;
        for _ in 0..25 {
            let status = std::process::Command::new("kill")
                .args(["-TERM", pid.as_str()])
                .status()
                .expect("run kill");
            assert!(status.success());

            if let Ok(joined) =
                tokio::time::timeout(Duration::from_millis(200), &mut supervised).await
            {
                outcome = Some(joined.expect("supervisor task").expect("graceful drain"));
                break;
            }
        }

        assert_eq!(outcome, Some(Outcome::Drained));
        assert_eq!(ctx.state(), LifecycleState::Stopped);
        assert!(ctx.is_shutdown_requested());
        std::net::TcpListener::bind(addr).expect("port released after SIGTERM");
    }
}
