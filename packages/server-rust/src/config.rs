//! Configuration types for the supervisor and the network transports.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default TCP port for the HTTP and RPC transports.
pub const DEFAULT_PORT: u16 = 8080;

/// Default Unix domain socket path for the RPC transport.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/greeter.sock";

/// Lifecycle supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Duration after which graceful shutdown is abandoned and the resource
    /// is forcibly released.
    pub drain_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(1),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// RPC transport settings.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Which kind of socket to listen on.
    pub network: NetworkFamily,
    /// Bind address for TCP families.
    pub host: String,
    /// Port for TCP families. 0 means OS-assigned.
    pub port: u16,
    /// Socket path for the `unix` family.
    pub socket_path: PathBuf,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            network: NetworkFamily::Tcp,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }
}

impl RpcConfig {
    /// Resolves the configured family into a concrete endpoint.
    #[must_use]
    pub fn endpoint(&self) -> ListenEndpoint {
        match self.network {
            NetworkFamily::Unix => ListenEndpoint::Unix {
                path: self.socket_path.clone(),
            },
            family => ListenEndpoint::Tcp {
                family,
                host: self.host.clone(),
                port: self.port,
            },
        }
    }
}

/// Socket family selection, named after the usual `network` strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NetworkFamily {
    /// TCP over whichever IP version the host resolves to first.
    #[default]
    Tcp,
    /// TCP restricted to IPv4 addresses.
    Tcp4,
    /// TCP restricted to IPv6 addresses.
    Tcp6,
    /// Unix domain stream socket.
    Unix,
}

impl NetworkFamily {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
            Self::Unix => "unix",
        }
    }
}

impl fmt::Display for NetworkFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown network family.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network family: {0} (expected tcp, tcp4, tcp6 or unix)")]
pub struct UnknownNetworkFamily(pub String);

impl FromStr for NetworkFamily {
    type Err = UnknownNetworkFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            "unix" => Ok(Self::Unix),
            _ => Err(UnknownNetworkFamily(s.to_string())),
        }
    }
}

/// A fully resolved place to listen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenEndpoint {
    /// TCP host and port, restricted to `family`.
    Tcp {
        family: NetworkFamily,
        host: String,
        port: u16,
    },
    /// Unix domain socket at `path`.
    Unix { path: PathBuf },
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { family, host, port } => write!(f, "{family}://{host}:{port}"),
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}
