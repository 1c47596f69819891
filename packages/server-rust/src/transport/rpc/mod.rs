//! gRPC transport: unary and bidirectional-streaming access to the command.
//!
//! Listens on TCP or a Unix domain socket depending on the configured
//! network family. Stream failures are reported to the peer as a gRPC
//! status and never end the server.

#[allow(clippy::pedantic)]
pub mod proto;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use greeter_core::Command;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::{Stream, StreamExt};
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

use super::{BoundEndpoint, Listener, Transport, TransportError};
use crate::config::RpcConfig;
use crate::lifecycle::LifecycleContext;
use proto::command_server::CommandServer;
use proto::{CommandArguments, CommandResult};

/// Response stream type for `HandleStream`.
pub type CommandResultStream = Pin<Box<dyn Stream<Item = Result<CommandResult, Status>> + Send>>;

/// gRPC service answering both RPC shapes with one command.
pub struct CommandService {
    command: Arc<dyn Command>,
    lifecycle: Arc<LifecycleContext>,
}

impl CommandService {
    /// Creates the service around a shared command.
    pub fn new(command: Arc<dyn Command>, lifecycle: Arc<LifecycleContext>) -> Self {
        Self { command, lifecycle }
    }
}

#[tonic::async_trait]
impl proto::command_server::Command for CommandService {
    async fn handle(
        &self,
        request: Request<CommandArguments>,
    ) -> Result<Response<CommandResult>, Status> {
        let _in_flight = self.lifecycle.in_flight_guard();
        let args = request.into_inner().args;
        debug!(?args, "handling unary RPC");
        Ok(Response::new(CommandResult {
            result: self.command.invoke(&args),
        }))
    }

    type HandleStreamStream = CommandResultStream;

    /// Answers each inbound message with exactly one result, in order.
    ///
    /// The response stream ends when the peer half-closes; a read error is
    /// forwarded as the stream's final status.
    async fn handle_stream(
        &self,
        request: Request<Streaming<CommandArguments>>,
    ) -> Result<Response<Self::HandleStreamStream>, Status> {
        let in_flight = self.lifecycle.in_flight_guard();
        let command = Arc::clone(&self.command);
        let inbound = request.into_inner();

        debug!("stream opened");
        let outbound: Self::HandleStreamStream = Box::pin(inbound.map(move |message| {
            let _stream_open = &in_flight;
            match message {
                Ok(arguments) => Ok(CommandResult {
                    result: command.invoke(&arguments.args),
                }),
                Err(status) => {
                    warn!(code = ?status.code(), message = status.message(), "stream read failed");
                    Err(status)
                }
            }
        }));

        Ok(Response::new(outbound))
    }
}

/// gRPC listener on TCP or a Unix domain socket.
pub struct RpcTransport {
    config: RpcConfig,
    command: Arc<dyn Command>,
    listener: Option<Listener>,
}

impl RpcTransport {
    /// Creates an unbound gRPC transport.
    pub fn new(config: RpcConfig, command: Arc<dyn Command>) -> Self {
        Self {
            config,
            command,
            listener: None,
        }
    }
}

#[async_trait]
impl Transport for RpcTransport {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn bind(&mut self) -> Result<BoundEndpoint, TransportError> {
        let listener = Listener::bind(&self.config.endpoint()).await?;
        let endpoint = listener.local_endpoint()?;

        info!("gRPC listener bound to {}", endpoint);

        self.listener = Some(listener);
        Ok(endpoint)
    }

    async fn serve(self, ctx: Arc<LifecycleContext>) -> Result<(), TransportError> {
        let listener = self
            .listener
            .ok_or(TransportError::NotBound { transport: "rpc" })?;
        let service = CommandService::new(self.command, Arc::clone(&ctx));
        let router = Server::builder().add_service(CommandServer::new(service));
        let shutdown = ctx.shutdown_requested();

        info!("Serving gRPC connections");

        match listener {
            Listener::Tcp(tcp) => {
                router
                    .serve_with_incoming_shutdown(TcpListenerStream::new(tcp), shutdown)
                    .await?;
            }
            #[cfg(unix)]
            Listener::Unix(unix, socket_file) => {
                let incoming = tokio_stream::wrappers::UnixListenerStream::new(unix);
                router
                    .serve_with_incoming_shutdown(incoming, shutdown)
                    .await?;
                drop(socket_file);
            }
        }

        info!("gRPC listener closed");
        Ok(())
    }
}
