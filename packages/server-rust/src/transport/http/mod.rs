//! HTTP transport: a single catch-all route answering the `params` query
//! parameter.

pub mod middleware;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Router;
use greeter_core::{single_param, Command};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::listener::bind_tcp;
use super::{BoundEndpoint, Transport, TransportError};
use crate::config::{HttpConfig, NetworkFamily};
use crate::lifecycle::LifecycleContext;

pub use middleware::build_http_layers;

/// Name of the query parameter carrying the argument.
pub const PARAMS_QUERY_KEY: &str = "params";

/// Shared state passed to the handler via `State` extraction.
#[derive(Clone)]
pub struct HttpState {
    /// The command every request is answered with.
    pub command: Arc<dyn Command>,
    /// Lifecycle context for in-flight tracking.
    pub lifecycle: Arc<LifecycleContext>,
}

/// Answers every method on every path.
///
/// The first `params` value is the only argument; when it is absent or
/// empty the command receives no arguments. The command runs on the blocking
/// pool so the request timeout can cut a slow invocation short.
///
/// # Errors
///
/// Answers `500` if the command panics.
pub async fn greet_handler(
    State(state): State<HttpState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<String, StatusCode> {
    let _in_flight = state.lifecycle.in_flight_guard();
    let param = pairs
        .iter()
        .find(|(key, _)| key == PARAMS_QUERY_KEY)
        .map(|(_, value)| value.as_str());
    let args = single_param(param);
    debug!(?args, "handling HTTP request");

    let command = Arc::clone(&state.command);
    tokio::task::spawn_blocking(move || command.invoke(&args))
        .await
        .map_err(|err| {
            warn!(error = %err, "command panicked");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Assembles the router: a fallback route for everything, plus middleware.
pub fn build_router(config: &HttpConfig, state: HttpState) -> Router {
    Router::new()
        .fallback(greet_handler)
        .layer(build_http_layers(config))
        .with_state(state)
}

/// HTTP listener serving the greeting on every path.
pub struct HttpTransport {
    config: HttpConfig,
    command: Arc<dyn Command>,
    listener: Option<TcpListener>,
}

impl HttpTransport {
    /// Creates an unbound HTTP transport.
    pub fn new(config: HttpConfig, command: Arc<dyn Command>) -> Self {
        Self {
            config,
            command,
            listener: None,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn bind(&mut self) -> Result<BoundEndpoint, TransportError> {
        let listener = bind_tcp(NetworkFamily::Tcp, &self.config.host, self.config.port).await?;
        let addr = listener.local_addr()?;

        info!("HTTP listener bound to {}", addr);

        self.listener = Some(listener);
        Ok(BoundEndpoint::Tcp(addr))
    }

    async fn serve(self, ctx: Arc<LifecycleContext>) -> Result<(), TransportError> {
        let listener = self
            .listener
            .ok_or(TransportError::NotBound { transport: "http" })?;
        let state = HttpState {
            command: self.command,
            lifecycle: Arc::clone(&ctx),
        };
        let router = build_router(&self.config, state);

        info!("Serving HTTP connections");

        axum::serve(listener, router)
            .with_graceful_shutdown(ctx.shutdown_requested())
            .await?;

        info!("HTTP listener closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisorConfig;
    use crate::lifecycle::{LifecycleState, Outcome, RunningServer, Supervisor};
    use greeter_core::{FnCommand, HelloCommand};
    use std::time::Duration;

    fn local_config() -> HttpConfig {
        HttpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..HttpConfig::default()
        }
    }

    async fn start() -> (RunningServer, String) {
        let transport = HttpTransport::new(local_config(), Arc::new(HelloCommand));
        let running = Supervisor::new(transport, SupervisorConfig::default())
            .start()
            .await
            .expect("start http");
        let BoundEndpoint::Tcp(addr) = running.endpoint().clone() else {
            panic!("http binds TCP");
        };
        (running, format!("http://{addr}"))
    }

    async fn get_text(url: &str) -> (reqwest::StatusCode, String) {
        let response = reqwest::get(url).await.expect("request");
        let status = response.status();
        (status, response.text().await.expect("body"))
    }

    #[tokio::test]
    async fn greets_params_argument() {
        let (running, base) = start().await;

        let (status, body) = get_text(&format!("{base}/?params=Kevin")).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body, "Hello, Kevin!");

        running.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn missing_or_empty_params_uses_default_greeting() {
        let (running, base) = start().await;

        assert_eq!(get_text(&format!("{base}/")).await.1, "Hello!");
        assert_eq!(get_text(&format!("{base}/?params=")).await.1, "Hello!");
        assert_eq!(get_text(&format!("{base}/?other=Kevin")).await.1, "Hello!");

        running.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn any_path_and_method_is_answered() {
        let (running, base) = start().await;

        let (status, body) = get_text(&format!("{base}/some/deep/path?params=Ann")).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body, "Hello, Ann!");

        let response = reqwest::Client::new()
            .post(format!("{base}/submit?params=Bob"))
            .send()
            .await
            .expect("post");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.expect("body"), "Hello, Bob!");

        running.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn first_params_value_wins_and_is_decoded() {
        let (running, base) = start().await;

        let body = get_text(&format!("{base}/?params=Kevin%20Bob&params=Carol"))
            .await
            .1;
        assert_eq!(body, "Hello, Kevin Bob!");

        running.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn response_carries_request_id() {
        let (running, base) = start().await;

        let response = reqwest::get(format!("{base}/?params=Kevin"))
            .await
            .expect("request");
        assert!(response.headers().contains_key(middleware::REQUEST_ID_HEADER));

        running.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn slow_command_is_cut_off_with_408() {
        let config = HttpConfig {
            request_timeout: Duration::from_millis(50),
            ..local_config()
        };
        let slow = FnCommand::new(|args: &[String]| {
            std::thread::sleep(Duration::from_millis(300));
            HelloCommand.invoke(args)
        });
        let running = Supervisor::new(
            HttpTransport::new(config, Arc::new(slow)),
            SupervisorConfig::default(),
        )
        .start()
        .await
        .expect("start http");
        let BoundEndpoint::Tcp(addr) = running.endpoint().clone() else {
            panic!("http binds TCP");
        };

        let (status, _body) = get_text(&format!("http://{addr}/?params=Kevin")).await;
        assert_eq!(status, reqwest::StatusCode::REQUEST_TIMEOUT);

        running.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn stop_while_idle_releases_port() {
        let (running, _base) = start().await;
        let ctx = running.context();
        let BoundEndpoint::Tcp(addr) = running.endpoint().clone() else {
            panic!("http binds TCP");
        };

        let outcome = running.stop().await.expect("graceful stop");
        assert_eq!(outcome, Outcome::Drained);
        assert_eq!(ctx.state(), LifecycleState::Stopped);

        std::net::TcpListener::bind(addr).expect("port released after stop");
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = taken.local_addr().expect("addr").port();
        let config = HttpConfig {
            port,
            ..local_config()
        };

        let supervisor = Supervisor::new(
            HttpTransport::new(config, Arc::new(HelloCommand)),
            SupervisorConfig::default(),
        );
        let ctx = supervisor.context();
        let err = supervisor.start().await.expect_err("port already taken");

        assert!(matches!(
            err,
            crate::lifecycle::LifecycleError::Bind { .. }
        ));
        assert_eq!(ctx.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn serve_without_bind_is_an_error() {
        let transport = HttpTransport::new(local_config(), Arc::new(HelloCommand));
        let err = transport
            .serve(Arc::new(LifecycleContext::new()))
            .await
            .expect_err("serve requires bind");
        assert!(matches!(err, TransportError::NotBound { transport: "http" }));
    }
}
