//! Transport bindings: adapters from one wire or I/O format to `Command`
//! invocations.
//!
//! Every binding follows the deferred startup pattern:
//! 1. construction -- captures configuration and the shared `Command`
//! 2. `bind()` -- acquires the listener or stream (failure is fatal)
//! 3. `serve()` -- answers requests until input ends, a fatal error occurs,
//!    or the lifecycle context requests shutdown
//!
//! The supervisor in [`crate::lifecycle`] drives these steps and owns the
//! task `serve()` runs on.

pub mod http;
pub mod listener;
pub mod pipe;
pub mod rpc;

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::NetworkFamily;
use crate::lifecycle::LifecycleContext;

pub use http::HttpTransport;
pub use listener::Listener;
pub use pipe::{LinePipe, OneShot};
pub use rpc::RpcTransport;

/// A transport that can be bound once and then served until shutdown.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Acquires the listener or stream backing this transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be acquired (e.g., port in use).
    async fn bind(&mut self) -> Result<BoundEndpoint, TransportError>;

    /// Serves requests until completion or until `ctx` requests shutdown.
    ///
    /// On shutdown the transport stops accepting new work, lets in-flight
    /// requests finish, and returns. Dropping the returned future releases
    /// the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind()` was not called first or the listener
    /// fails irrecoverably.
    async fn serve(self, ctx: Arc<LifecycleContext>) -> Result<(), TransportError>;
}

/// Where a bound transport is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundEndpoint {
    /// A TCP listener at the given local address.
    Tcp(SocketAddr),
    /// A Unix domain socket at the given path.
    Unix(PathBuf),
    /// Standard input and output.
    Stdio,
}

impl fmt::Display for BoundEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Stdio => f.write_str("stdio"),
        }
    }
}

/// Errors surfaced while binding or serving a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no {family} addresses resolved for {host}:{port}")]
    ResolveEmpty {
        family: NetworkFamily,
        host: String,
        port: u16,
    },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("network family {family} cannot be used for a TCP listener")]
    NotTcp { family: NetworkFamily },
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {path}")]
    UnsupportedUnix { path: String },
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        path: String,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("existing unix socket {path} is already in use")]
    UnixInUse { path: String },
    #[cfg(unix)]
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket { path: String },
    #[cfg(unix)]
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{transport} transport served before bind")]
    NotBound { transport: &'static str },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("gRPC transport error: {0}")]
    Rpc(#[from] tonic::transport::Error),
}
