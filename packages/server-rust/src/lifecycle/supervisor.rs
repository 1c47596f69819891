//! Supervisor for a single transport.
//!
//! Binds the transport, runs its serve loop on a spawned task and races that
//! task against a stop request. A stop request cancels the shared shutdown
//! token and waits at most `drain_timeout` for the serve loop to finish; past
//! that bound the task is aborted, which drops (and so releases) the listener.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use super::{LifecycleContext, LifecycleError, LifecycleState};
use crate::config::SupervisorConfig;
use crate::transport::{BoundEndpoint, Transport, TransportError};

type ServeResult = Result<Result<(), TransportError>, JoinError>;

/// How a supervised transport ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The serve loop finished on its own (e.g., end of input).
    Completed,
    /// A stop request arrived and the serve loop drained within the bound.
    Drained,
}

/// Owns a transport that has not been started yet.
pub struct Supervisor<T> {
    transport: T,
    config: SupervisorConfig,
    ctx: Arc<LifecycleContext>,
}

impl<T: Transport> fmt::Debug for Supervisor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("transport", &self.transport.name())
            .field("config", &self.config)
            .field("state", &self.ctx.state())
            .finish()
    }
}

impl<T: Transport> Supervisor<T> {
    /// Creates a supervisor in the `Starting` state.
    pub fn new(transport: T, config: SupervisorConfig) -> Self {
        Self {
            transport,
            config,
            ctx: Arc::new(LifecycleContext::new()),
        }
    }

    /// Returns the lifecycle context shared with the serve task.
    #[must_use]
    pub fn context(&self) -> Arc<LifecycleContext> {
        Arc::clone(&self.ctx)
    }

    /// Binds the transport and spawns its serve loop.
    ///
    /// Returns as soon as the serve task is running.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Bind`] if the listener cannot be acquired;
    /// the state is then `Failed` and nothing is served.
    pub async fn start(mut self) -> Result<RunningServer, LifecycleError> {
        let name = self.transport.name();

        let endpoint = match self.transport.bind().await {
            Ok(endpoint) => endpoint,
            Err(source) => {
                self.ctx.set_failed();
                error!(transport = name, error = %source, "bind failed");
                return Err(LifecycleError::Bind {
                    transport: name,
                    source,
                });
            }
        };

        let task = tokio::spawn(self.transport.serve(Arc::clone(&self.ctx)));
        self.ctx.set_serving();
        info!(transport = name, %endpoint, "transport serving");

        Ok(RunningServer {
            name,
            endpoint,
            task,
            ctx: self.ctx,
            drain_timeout: self.config.drain_timeout,
        })
    }

    /// Starts the transport and supervises it until it finishes or `signal`
    /// resolves.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::start`] and [`RunningServer::wait_for`].
    pub async fn run<S>(self, signal: S) -> Result<Outcome, LifecycleError>
    where
        S: Future<Output = ()>,
    {
        self.start().await?.wait_for(signal).await
    }
}

/// Handle to a transport whose serve loop is running.
///
/// Dropping the handle aborts the serve task.
#[derive(Debug)]
pub struct RunningServer {
    name: &'static str,
    endpoint: BoundEndpoint,
    task: JoinHandle<Result<(), TransportError>>,
    ctx: Arc<LifecycleContext>,
    drain_timeout: Duration,
}

impl RunningServer {
    /// Where the transport is listening.
    #[must_use]
    pub fn endpoint(&self) -> &BoundEndpoint {
        &self.endpoint
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.ctx.state()
    }

    /// Returns the lifecycle context shared with the serve task.
    #[must_use]
    pub fn context(&self) -> Arc<LifecycleContext> {
        Arc::clone(&self.ctx)
    }

    /// Waits for the serve loop to finish, or for `signal` to request a
    /// graceful stop, whichever happens first.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Serve`] if the serve loop returned an error
    /// - [`LifecycleError::Panicked`] if the serve task panicked
    /// - [`LifecycleError::DrainTimeout`] if draining overran its bound
    pub async fn wait_for<S>(mut self, signal: S) -> Result<Outcome, LifecycleError>
    where
        S: Future<Output = ()>,
    {
        let finished = tokio::select! {
            biased;
            joined = &mut self.task => Some(joined),
            () = signal => None,
        };

        match finished {
            Some(joined) => self.settle(joined).map(|()| Outcome::Completed),
            None => self.drain().await,
        }
    }

    /// Requests a graceful stop with the same bound and escalation as a
    /// termination signal.
    ///
    /// # Errors
    ///
    /// See [`RunningServer::wait_for`].
    pub async fn stop(self) -> Result<Outcome, LifecycleError> {
        self.wait_for(std::future::ready(())).await
    }

    async fn drain(&mut self) -> Result<Outcome, LifecycleError> {
        if self.ctx.begin_drain() {
            info!(
                transport = self.name,
                in_flight = self.ctx.in_flight_count(),
                "Draining, bound {}ms",
                self.drain_timeout.as_millis()
            );
        }

        match tokio::time::timeout(self.drain_timeout, &mut self.task).await {
            Ok(joined) => self.settle(joined).map(|()| Outcome::Drained),
            Err(_elapsed) => {
                let in_flight = self.ctx.in_flight_count();
                warn!(
                    transport = self.name,
                    in_flight, "Drain timeout expired, aborting serve task"
                );

                self.task.abort();
                // Wait until the aborted future is dropped so the listener is
                // released before reporting.
                if let Err(err) = (&mut self.task).await {
                    if !err.is_cancelled() {
                        warn!(transport = self.name, error = %err, "serve task failed while aborting");
                    }
                }

                self.ctx.set_failed();
                let err = LifecycleError::DrainTimeout {
                    transport: self.name,
                    timeout: self.drain_timeout,
                    in_flight,
                };
                error!(error = %err, "shutdown escalated");
                Err(err)
            }
        }
    }

    fn settle(&self, joined: ServeResult) -> Result<(), LifecycleError> {
        match joined {
            Ok(Ok(())) => {
                self.ctx.set_stopped();
                info!(transport = self.name, "transport stopped");
                Ok(())
            }
            Ok(Err(source)) => {
                self.ctx.set_failed();
                error!(transport = self.name, error = %source, "serve loop failed");
                Err(LifecycleError::Serve {
                    transport: self.name,
                    source,
                })
            }
            Err(source) => {
                self.ctx.set_failed();
                error!(transport = self.name, error = %source, "serve task panicked");
                Err(LifecycleError::Panicked {
                    transport: self.name,
                    source,
                })
            }
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io;

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        Complete,
        Fail,
        Panic,
        FailBind,
        UntilShutdown,
        Hang,
    }

    struct StubTransport(Behavior);

    #[async_trait]
    impl Transport for StubTransport {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn bind(&mut self) -> Result<BoundEndpoint, TransportError> {
            match self.0 {
                Behavior::FailBind => Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    "address in use",
                ))),
                _ => Ok(BoundEndpoint::Stdio),
            }
        }

        async fn serve(self, ctx: Arc<LifecycleContext>) -> Result<(), TransportError> {
            match self.0 {
                Behavior::Complete | Behavior::FailBind => Ok(()),
                Behavior::Fail => Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "listener broke",
                ))),
                Behavior::Panic => panic!("serve loop panicked"),
                Behavior::UntilShutdown => {
                    ctx.shutdown_requested().await;
                    Ok(())
                }
                Behavior::Hang => {
                    let _in_flight = ctx.in_flight_guard();
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        }
    }

    fn supervisor(behavior: Behavior) -> Supervisor<StubTransport> {
        Supervisor::new(StubTransport(behavior), SupervisorConfig::default())
    }

    #[test]
    fn supervisor_debug_names_transport_and_state() {
        let rendered = format!("{:?}", supervisor(Behavior::Complete));
        assert!(rendered.contains(r#"transport: "stub""#), "{rendered}");
        assert!(rendered.contains("state: Starting"), "{rendered}");
    }

    #[tokio::test]
    async fn start_reports_serving_and_endpoint() {
        let running = supervisor(Behavior::UntilShutdown)
            .start()
            .await
            .expect("start");

        assert_eq!(running.state(), LifecycleState::Serving);
        assert_eq!(running.endpoint(), &BoundEndpoint::Stdio);
        running.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn serve_completion_wins_the_race() {
        let supervisor = supervisor(Behavior::Complete);
        let ctx = supervisor.context();

        let outcome = supervisor
            .run(std::future::pending())
            .await
            .expect("completes");

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(ctx.state(), LifecycleState::Stopped);
        assert!(!ctx.is_shutdown_requested());
    }

    #[tokio::test]
    async fn serve_error_is_failed() {
        let supervisor = supervisor(Behavior::Fail);
        let ctx = supervisor.context();

        let err = supervisor
            .run(std::future::pending())
            .await
            .expect_err("serve error");

        assert!(matches!(err, LifecycleError::Serve { transport: "stub", .. }));
        assert_eq!(ctx.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn bind_failure_never_serves() {
        let supervisor = supervisor(Behavior::FailBind);
        let ctx = supervisor.context();

        let err = supervisor.start().await.expect_err("bind failure");

        assert!(matches!(err, LifecycleError::Bind { .. }));
        assert_eq!(ctx.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn panicking_serve_task_is_reported() {
        let supervisor = supervisor(Behavior::Panic);
        let ctx = supervisor.context();

        let err = supervisor
            .run(std::future::pending())
            .await
            .expect_err("panic");

        assert!(matches!(err, LifecycleError::Panicked { .. }));
        assert_eq!(ctx.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn signal_drains_gracefully() {
        let supervisor = supervisor(Behavior::UntilShutdown);
        let ctx = supervisor.context();

        let outcome = supervisor
            .run(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .expect("drains");

        assert_eq!(outcome, Outcome::Drained);
        assert_eq!(ctx.state(), LifecycleState::Stopped);
        assert!(ctx.is_shutdown_requested());
    }

    #[tokio::test]
    async fn stop_after_external_drain_request_still_settles() {
        let running = supervisor(Behavior::UntilShutdown)
            .start()
            .await
            .expect("start");
        let ctx = running.context();

        assert!(ctx.begin_drain());
        assert!(!ctx.begin_drain());

        let outcome = running.stop().await.expect("drains");
        assert!(matches!(outcome, Outcome::Completed | Outcome::Drained));
        assert_eq!(ctx.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn drain_overrun_aborts_and_fails() {
        let config = SupervisorConfig {
            drain_timeout: Duration::from_millis(50),
        };
        let running = Supervisor::new(StubTransport(Behavior::Hang), config)
            .start()
            .await
            .expect("start");
        let ctx = running.context();
        while ctx.in_flight_count() == 0 {
            tokio::task::yield_now().await;
        }

        let err = running.stop().await.expect_err("drain overrun");

        match err {
            LifecycleError::DrainTimeout {
                transport,
                timeout,
                in_flight,
            } => {
                assert_eq!(transport, "stub");
                assert_eq!(timeout, Duration::from_millis(50));
                assert_eq!(in_flight, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ctx.state(), LifecycleState::Failed);
        assert_eq!(ctx.in_flight_count(), 0, "aborted task released its guard");
    }

    #[tokio::test]
    async fn dropping_running_server_aborts_serve_task() {
        let running = supervisor(Behavior::Hang).start().await.expect("start");
        let ctx = running.context();
        while ctx.in_flight_count() == 0 {
            tokio::task::yield_now().await;
        }

        drop(running);

        tokio::time::timeout(Duration::from_secs(1), async {
            while ctx.in_flight_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("serve task aborted");
    }
}
